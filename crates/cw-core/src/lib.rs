//! cw-core: Core types and traits for the campaign chat widget
//!
//! This crate provides the chat widget state machine together with the
//! collaborator traits it is wired to and the smaller page-level helpers
//! (engagement tracking, share links, field validation).

pub mod analytics;
pub mod backend;
pub mod engagement;
pub mod error;
pub mod message;
pub mod schedule;
pub mod share;
pub mod validate;
pub mod widget;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use analytics::{AnalyticsEvent, AnalyticsSink, NoopSink, TracingSink};
pub use backend::{ChatBackend, ChatReply, ChatRequest, CAMPAIGN_CONTEXT};
pub use engagement::{Clock, ScrollDepthTracker, ScrollSource, SystemClock, TimeOnPageTracker};
pub use error::Error;
pub use message::{Entry, Message, RequestId, Sender, Transcript};
pub use schedule::FollowUpScheduler;
pub use share::{track_share, Platform, ShareLinks};
pub use validate::{validate_email, validate_phone, validate_signup, validate_zip, FieldError, SignupForm};
pub use widget::{
    ChatWidget, ChatWidgetBuilder, Exchange, NoSignup, Outcome, Row, SignupFlow, TranscriptView,
    WidgetConfig,
};

pub type Result<T> = std::result::Result<T, Error>;
