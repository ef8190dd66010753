//! Test utilities shared across the workspace.
//! Only compiled when running tests or with the `testing` feature.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::backend::{ChatBackend, ChatReply, ChatRequest};
use crate::engagement::{Clock, ScrollSource};
use crate::error::Error;
use crate::widget::SignupFlow;

type Reply = Result<ChatReply, Error>;

/// A mock chat backend that returns pre-configured replies.
pub struct MockBackend {
    responses: Mutex<Vec<Reply>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
    /// Captured requests (for assertion).
    pub captured_requests: Mutex<Vec<ChatRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            captured_requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain reply for the next send() call.
    /// Replies are returned in FIFO order (first queued = first returned).
    pub fn queue_reply(&self, reply: &str) {
        self.queue(Ok(ChatReply::new(reply)));
    }

    /// Queue a raw result.
    pub fn queue(&self, result: Reply) {
        self.responses.lock().unwrap().insert(0, result);
    }

    /// Hold the request whose message equals `message` until the returned
    /// sender delivers its result. Gated messages bypass the FIFO queue.
    pub fn gate(&self, message: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(message.to_string(), rx);
        tx
    }

    /// Get the number of captured requests.
    pub fn request_count(&self) -> usize {
        self.captured_requests.lock().unwrap().len()
    }

    /// Get the last captured request.
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.captured_requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatReply, Error> {
        let gate = self.gates.lock().unwrap().remove(&request.message);
        self.captured_requests.lock().unwrap().push(request);

        if let Some(rx) = gate {
            return rx.await.unwrap_or(Err(Error::Cancelled));
        }
        match self.responses.lock().unwrap().pop() {
            Some(result) => result,
            None => Err(Error::network("No mock response queued")),
        }
    }
}

/// Records every emitted analytics event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }
}

impl AnalyticsSink for RecordingSink {
    fn emit(&self, event: AnalyticsEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Counts how often the signup flow was opened.
#[derive(Default)]
pub struct RecordingSignup {
    opened: AtomicUsize,
}

impl RecordingSignup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl SignupFlow for RecordingSignup {
    fn open(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }
}

/// A clock that only moves when told to.
#[derive(Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }
}

/// A scroll position set directly by the test.
pub struct FixedScroll {
    position: Mutex<(f64, f64, f64)>,
}

impl FixedScroll {
    pub fn new(scroll_height: f64, viewport_height: f64) -> Self {
        Self {
            position: Mutex::new((0.0, scroll_height, viewport_height)),
        }
    }

    pub fn scroll_to(&self, scroll_y: f64) {
        self.position.lock().unwrap().0 = scroll_y;
    }
}

impl ScrollSource for FixedScroll {
    fn scroll_y(&self) -> f64 {
        self.position.lock().unwrap().0
    }

    fn scroll_height(&self) -> f64 {
        self.position.lock().unwrap().1
    }

    fn viewport_height(&self) -> f64 {
        self.position.lock().unwrap().2
    }
}
