//! Scroll-depth and time-on-page milestone tracking.
//!
//! Both trackers read their inputs through injected providers so the same
//! code runs against a real page, a terminal session, or a test double.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::analytics::{AnalyticsEvent, AnalyticsSink, SCROLL_DEPTH, TIME_ON_PAGE};

pub const SCROLL_MILESTONES: [u32; 4] = [25, 50, 75, 100];
pub const TIME_MILESTONES: [u64; 4] = [30, 60, 120, 300];
/// Polling cadence used by [`TimeOnPageTracker::run`] callers by default.
pub const TIME_POLL_INTERVAL: Duration = Duration::from_secs(10);

pub trait Clock: Send + Sync {
    /// Time since the page view started.
    fn elapsed(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

pub trait ScrollSource: Send + Sync {
    fn scroll_y(&self) -> f64;
    fn scroll_height(&self) -> f64;
    fn viewport_height(&self) -> f64;
}

/// Percentage of the scrollable range covered, rounded and clamped to 0..=100.
/// A page that cannot scroll is fully seen.
pub fn scroll_percentage(scroll_y: f64, scroll_height: f64, viewport_height: f64) -> u32 {
    let range = scroll_height - viewport_height;
    if range <= 0.0 {
        return 100;
    }
    let pct = (scroll_y / range * 100.0).round();
    pct.clamp(0.0, 100.0) as u32
}

pub struct ScrollDepthTracker {
    source: Arc<dyn ScrollSource>,
    analytics: Arc<dyn AnalyticsSink>,
    page: String,
    max_depth: u32,
    reached: [bool; 4],
}

impl ScrollDepthTracker {
    pub fn new(
        source: Arc<dyn ScrollSource>,
        analytics: Arc<dyn AnalyticsSink>,
        page: impl Into<String>,
    ) -> Self {
        Self {
            source,
            analytics,
            page: page.into(),
            max_depth: 0,
            reached: [false; 4],
        }
    }

    /// Read the current scroll position and emit any milestone reached for
    /// the first time. Returns the milestones emitted by this call.
    pub fn observe(&mut self) -> Vec<u32> {
        let pct = scroll_percentage(
            self.source.scroll_y(),
            self.source.scroll_height(),
            self.source.viewport_height(),
        );
        self.max_depth = self.max_depth.max(pct);

        let mut fired = Vec::new();
        for (i, milestone) in SCROLL_MILESTONES.iter().enumerate() {
            if pct >= *milestone && !self.reached[i] {
                self.reached[i] = true;
                fired.push(*milestone);
                self.analytics.emit(
                    AnalyticsEvent::new(SCROLL_DEPTH)
                        .with("depth", format!("{milestone}%"))
                        .with("page", self.page.as_str()),
                );
            }
        }
        if !fired.is_empty() {
            debug!(page = %self.page, ?fired, "scroll milestones reached");
        }
        fired
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }
}

pub struct TimeOnPageTracker {
    clock: Arc<dyn Clock>,
    analytics: Arc<dyn AnalyticsSink>,
    page: String,
    reached: [bool; 4],
}

impl TimeOnPageTracker {
    pub fn new(clock: Arc<dyn Clock>, analytics: Arc<dyn AnalyticsSink>, page: impl Into<String>) -> Self {
        Self {
            clock,
            analytics,
            page: page.into(),
            reached: [false; 4],
        }
    }

    /// Emit every time milestone passed since the last tick.
    pub fn tick(&mut self) -> Vec<u64> {
        let seconds = self.clock.elapsed().as_secs();
        let mut fired = Vec::new();
        for (i, milestone) in TIME_MILESTONES.iter().enumerate() {
            if seconds >= *milestone && !self.reached[i] {
                self.reached[i] = true;
                fired.push(*milestone);
                self.analytics.emit(
                    AnalyticsEvent::new(TIME_ON_PAGE)
                        .with("seconds", milestone.to_string())
                        .with("page", self.page.as_str()),
                );
            }
        }
        fired
    }

    pub fn is_complete(&self) -> bool {
        self.reached.iter().all(|r| *r)
    }

    /// Tick every `every` until all milestones have fired.
    pub async fn run(mut self, every: Duration) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        while !self.is_complete() {
            interval.tick().await;
            self.tick();
        }
        debug!(page = %self.page, "time-on-page tracking complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedScroll, ManualClock, RecordingSink};

    #[test]
    fn test_scroll_percentage() {
        assert_eq!(scroll_percentage(0.0, 2000.0, 1000.0), 0);
        assert_eq!(scroll_percentage(500.0, 2000.0, 1000.0), 50);
        assert_eq!(scroll_percentage(1000.0, 2000.0, 1000.0), 100);
        assert_eq!(scroll_percentage(1200.0, 2000.0, 1000.0), 100);
        assert_eq!(scroll_percentage(0.0, 800.0, 1000.0), 100);
    }

    #[test]
    fn test_scroll_milestones_fire_once() {
        let scroll = Arc::new(FixedScroll::new(1400.0, 1000.0));
        let sink = Arc::new(RecordingSink::new());
        let mut tracker = ScrollDepthTracker::new(scroll.clone(), sink.clone(), "/issues");

        scroll.scroll_to(120.0);
        assert_eq!(tracker.observe(), vec![25]);
        assert_eq!(tracker.observe(), Vec::<u32>::new());

        scroll.scroll_to(310.0);
        assert_eq!(tracker.observe(), vec![50, 75]);

        scroll.scroll_to(0.0);
        assert!(tracker.observe().is_empty());
        assert_eq!(tracker.max_depth(), 78);

        scroll.scroll_to(400.0);
        assert_eq!(tracker.observe(), vec![100]);

        let depths: Vec<_> = sink
            .events()
            .iter()
            .map(|e| e.attr("depth").unwrap().to_string())
            .collect();
        assert_eq!(depths, vec!["25%", "50%", "75%", "100%"]);
        assert!(sink.events().iter().all(|e| e.attr("page") == Some("/issues")));
    }

    #[test]
    fn test_time_milestones() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(RecordingSink::new());
        let mut tracker = TimeOnPageTracker::new(clock.clone(), sink.clone(), "/");

        clock.advance(Duration::from_secs(20));
        assert!(tracker.tick().is_empty());

        clock.advance(Duration::from_secs(50));
        assert_eq!(tracker.tick(), vec![30, 60]);
        assert!(tracker.tick().is_empty());

        clock.advance(Duration::from_secs(300));
        assert_eq!(tracker.tick(), vec![120, 300]);
        assert!(tracker.is_complete());

        let seconds: Vec<_> = sink
            .events()
            .iter()
            .map(|e| e.attr("seconds").unwrap().to_string())
            .collect();
        assert_eq!(seconds, vec!["30", "60", "120", "300"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_complete() {
        let clock = Arc::new(SystemClockShim(tokio::time::Instant::now()));
        let sink = Arc::new(RecordingSink::new());
        let tracker = TimeOnPageTracker::new(clock, sink.clone(), "/");

        tracker.run(TIME_POLL_INTERVAL).await;
        assert_eq!(sink.events().len(), TIME_MILESTONES.len());
    }

    /// Clock on tokio's (pausable) time source.
    struct SystemClockShim(tokio::time::Instant);

    impl Clock for SystemClockShim {
        fn elapsed(&self) -> Duration {
            self.0.elapsed()
        }
    }
}
