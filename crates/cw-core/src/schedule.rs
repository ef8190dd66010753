//! Cancellable one-shot timers keyed by request.
//!
//! The scheduler is meant to live inside the state it mutates, behind the
//! same lock: `schedule`, `cancel*` and the firing task's `take` all run with
//! that lock held, so a timer cancelled before it takes its slot never fires
//! its effect, even if the sleep already elapsed.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::AbortHandle;
use tracing::debug;

use crate::message::RequestId;

#[derive(Debug, Default)]
pub struct FollowUpScheduler {
    pending: HashMap<RequestId, AbortHandle>,
}

impl FollowUpScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fire` after `delay`. `fire` must call [`take`](Self::take) for
    /// `id` under the owning lock and skip its effect when that returns false.
    ///
    /// Replaces any timer already scheduled for `id`.
    pub fn schedule<F>(&mut self, id: RequestId, delay: Duration, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            fire.await;
        });
        debug!(request = %id, delay_ms = delay.as_millis() as u64, "follow-up scheduled");
        if let Some(previous) = self.pending.insert(id, handle.abort_handle()) {
            previous.abort();
        }
    }

    /// Claim the slot for `id`. Returns false if it was cancelled.
    pub fn take(&mut self, id: RequestId) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub fn cancel(&mut self, id: RequestId) -> bool {
        match self.pending.remove(&id) {
            Some(handle) => {
                handle.abort();
                debug!(request = %id, "follow-up cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel every pending timer, returning how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        for (id, handle) in self.pending.drain() {
            handle.abort();
            debug!(request = %id, "follow-up cancelled");
        }
        count
    }

    pub fn is_scheduled(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Drop for FollowUpScheduler {
    fn drop(&mut self) {
        for handle in self.pending.values() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<FollowUpScheduler>>, Arc<Mutex<Vec<RequestId>>>) {
        (
            Arc::new(Mutex::new(FollowUpScheduler::new())),
            Arc::new(Mutex::new(Vec::new())),
        )
    }

    fn fire(
        scheduler: &Arc<Mutex<FollowUpScheduler>>,
        fired: &Arc<Mutex<Vec<RequestId>>>,
        id: RequestId,
    ) -> impl Future<Output = ()> + Send + 'static {
        let scheduler = Arc::clone(scheduler);
        let fired = Arc::clone(fired);
        async move {
            if scheduler.lock().unwrap().take(id) {
                fired.lock().unwrap().push(id);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (scheduler, fired) = recorder();
        let task = fire(&scheduler, &fired, RequestId(1));
        scheduler
            .lock()
            .unwrap()
            .schedule(RequestId(1), Duration::from_secs(1), task);

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert!(fired.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*fired.lock().unwrap(), vec![RequestId(1)]);
        assert!(scheduler.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (scheduler, fired) = recorder();
        for n in 1..=3 {
            let task = fire(&scheduler, &fired, RequestId(n));
            scheduler
                .lock()
                .unwrap()
                .schedule(RequestId(n), Duration::from_secs(1), task);
        }

        assert!(scheduler.lock().unwrap().cancel(RequestId(2)));
        assert!(!scheduler.lock().unwrap().cancel(RequestId(2)));

        tokio::time::sleep(Duration::from_secs(2)).await;
        let mut got = fired.lock().unwrap().clone();
        got.sort();
        assert_eq!(got, vec![RequestId(1), RequestId(3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let (scheduler, fired) = recorder();
        for n in 1..=2 {
            let task = fire(&scheduler, &fired, RequestId(n));
            scheduler
                .lock()
                .unwrap()
                .schedule(RequestId(n), Duration::from_millis(500), task);
        }
        assert_eq!(scheduler.lock().unwrap().cancel_all(), 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(fired.lock().unwrap().is_empty());
    }
}
