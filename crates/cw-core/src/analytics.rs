//! Fire-and-forget analytics side-channel.
//!
//! Components receive an [`AnalyticsSink`] at construction instead of calling
//! a global tracker, so tests can assert on what was emitted.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

pub const CHATBOT_OPENED: &str = "chatbot_opened";
pub const CHATBOT_INTERACTION: &str = "chatbot_interaction";
pub const SCROLL_DEPTH: &str = "scroll_depth";
pub const TIME_ON_PAGE: &str = "time_on_page";
pub const SOCIAL_SHARE: &str = "social_share";
pub const SIGNUP: &str = "signup";
pub const MODAL_OPENED: &str = "modal_opened";
pub const SHARE_MODAL_OPENED: &str = "share_modal_opened";

/// `source` recorded for signups started from the chat's follow-up offer.
pub const MODAL_SIGNUP_SOURCE: &str = "modal_signup";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl AnalyticsEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

/// Receives analytics events.
///
/// Components call `emit` after releasing their own locks. Implementations
/// run on the caller's task, so they must return promptly and swallow their
/// own failures.
pub trait AnalyticsSink: Send + Sync {
    fn emit(&self, event: AnalyticsEvent);
}

/// Writes events as structured log records under the `analytics` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn emit(&self, event: AnalyticsEvent) {
        let attributes = serde_json::to_string(&event.attributes).unwrap_or_default();
        info!(target: "analytics", event = %event.name, %attributes, "analytics event");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl AnalyticsSink for NoopSink {
    fn emit(&self, _event: AnalyticsEvent) {}
}
