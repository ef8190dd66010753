//! The chat widget state machine.
//!
//! A [`ChatWidget`] owns visibility, the transcript and the follow-up timers.
//! Submitting text is split in two steps:
//!
//! - [`ChatWidget::submit`] runs synchronously. It appends the user message and
//!   a typing placeholder and hands back an [`Exchange`]. No I/O has started.
//! - [`Exchange::resolve`] performs the request and settles the placeholder
//!   with either the reply or the fallback message.
//!
//! Each exchange carries its own [`RequestId`], so several may be in flight
//! and settle in any order without touching each other's placeholder.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, warn};

use crate::analytics::{AnalyticsEvent, AnalyticsSink, NoopSink, CHATBOT_INTERACTION, CHATBOT_OPENED};
use crate::backend::{ChatBackend, ChatReply, ChatRequest, CAMPAIGN_CONTEXT};
use crate::error::Error;
use crate::message::{Entry, Message, RequestId, Sender, Transcript};
use crate::schedule::FollowUpScheduler;

pub const FALLBACK_REPLY: &str =
    "I'm having trouble connecting right now. Please email info@amyphanwest.com for help.";
pub const SIGNUP_PROMPT: &str =
    "Would you like to join our email list to stay updated on Amy's campaign?";
pub const SIGNUP_BUTTON_LABEL: &str = "Yes, sign me up!";
pub const TYPING_TEXT: &str = "...";
pub const FOLLOW_UP_DELAY: Duration = Duration::from_secs(1);

/// The signup flow opened by a follow-up prompt's affordance.
pub trait SignupFlow: Send + Sync {
    fn open(&self);
}

/// Signup flow that does nothing; used when none is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSignup;

impl SignupFlow for NoSignup {
    fn open(&self) {}
}

#[derive(Debug, Clone)]
pub struct WidgetConfig {
    /// Conversation domain sent with every request.
    pub context: String,
    pub follow_up_delay: Duration,
    pub fallback_text: String,
    pub follow_up_text: String,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            context: CAMPAIGN_CONTEXT.to_string(),
            follow_up_delay: FOLLOW_UP_DELAY,
            fallback_text: FALLBACK_REPLY.to_string(),
            follow_up_text: SIGNUP_PROMPT.to_string(),
        }
    }
}

/// How an exchange settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Replied { follow_up_scheduled: bool },
    Fallback,
}

/// One rendered transcript row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub sender: Sender,
    pub text: String,
    pub is_typing: bool,
    /// Label of the signup button, present on follow-up prompts.
    pub action: Option<&'static str>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptView {
    pub rows: Vec<Row>,
    /// Index of the newest row; the view keeps it in sight.
    pub scroll_to: Option<usize>,
}

#[derive(Debug, Default)]
struct WidgetState {
    visible: bool,
    transcript: Transcript,
    follow_ups: FollowUpScheduler,
    next_id: u64,
}

struct Inner {
    state: Mutex<WidgetState>,
    backend: Arc<dyn ChatBackend>,
    analytics: Arc<dyn AnalyticsSink>,
    signup: Arc<dyn SignupFlow>,
    config: WidgetConfig,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, WidgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(self: &Arc<Self>, id: RequestId, text: &str, result: Result<ChatReply, Error>) -> Outcome {
        match result {
            Ok(reply) => {
                let follow_up_scheduled = {
                    let mut state = self.lock();
                    state.transcript.settle(id, Message::bot(reply.reply.as_str()));
                    if reply.suggest_signup {
                        let weak = Arc::downgrade(self);
                        state.follow_ups.schedule(
                            id,
                            self.config.follow_up_delay,
                            deliver_follow_up(weak, id),
                        );
                    }
                    reply.suggest_signup
                };
                debug!(request = %id, follow_up_scheduled, "chat request settled");

                self.analytics.emit(
                    AnalyticsEvent::new(CHATBOT_INTERACTION)
                        .with("user_message", text)
                        .with("bot_response", reply.reply),
                );
                Outcome::Replied { follow_up_scheduled }
            }
            Err(e) => {
                warn!(request = %id, error = %e, retryable = e.is_retryable(), "chat request failed");
                self.lock()
                    .transcript
                    .settle(id, Message::bot(self.config.fallback_text.as_str()));
                Outcome::Fallback
            }
        }
    }

    /// Hide the widget and drop pending follow-ups. Returns true if it was open.
    fn close(state: &mut WidgetState) -> bool {
        if !state.visible {
            return false;
        }
        state.visible = false;
        let cancelled = state.follow_ups.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "widget closed, follow-ups cancelled");
        }
        true
    }
}

async fn deliver_follow_up(inner: Weak<Inner>, id: RequestId) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut state = inner.lock();
    if state.follow_ups.take(id) {
        state
            .transcript
            .push(Message::signup_offer(inner.config.follow_up_text.as_str()));
        debug!(request = %id, "follow-up delivered");
    }
}

pub struct ChatWidgetBuilder {
    backend: Arc<dyn ChatBackend>,
    analytics: Arc<dyn AnalyticsSink>,
    signup: Arc<dyn SignupFlow>,
    config: WidgetConfig,
}

impl ChatWidgetBuilder {
    pub fn with_analytics(mut self, analytics: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = analytics;
        self
    }

    pub fn with_signup(mut self, signup: Arc<dyn SignupFlow>) -> Self {
        self.signup = signup;
        self
    }

    pub fn with_config(mut self, config: WidgetConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ChatWidget {
        ChatWidget {
            inner: Arc::new(Inner {
                state: Mutex::new(WidgetState::default()),
                backend: self.backend,
                analytics: self.analytics,
                signup: self.signup,
                config: self.config,
            }),
        }
    }
}

/// Handle to the widget. Clones share the same state.
#[derive(Clone)]
pub struct ChatWidget {
    inner: Arc<Inner>,
}

impl ChatWidget {
    pub fn builder(backend: Arc<dyn ChatBackend>) -> ChatWidgetBuilder {
        ChatWidgetBuilder {
            backend,
            analytics: Arc::new(NoopSink),
            signup: Arc::new(NoSignup),
            config: WidgetConfig::default(),
        }
    }

    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self::builder(backend).build()
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.inner.config
    }

    /// Flip visibility and return the new state.
    ///
    /// Opening emits `chatbot_opened`. Closing cancels pending follow-ups.
    pub fn toggle_visibility(&self) -> bool {
        let opened = {
            let mut state = self.inner.lock();
            if state.visible {
                Inner::close(&mut state);
                false
            } else {
                state.visible = true;
                true
            }
        };
        if opened {
            self.inner.analytics.emit(AnalyticsEvent::new(CHATBOT_OPENED));
        }
        opened
    }

    pub fn is_visible(&self) -> bool {
        self.inner.lock().visible
    }

    /// Accept `text` for sending.
    ///
    /// Whitespace-only input is ignored. Otherwise the trimmed text and a
    /// typing placeholder are in the transcript when this returns, and any
    /// pending follow-up has been cancelled.
    pub fn submit(&self, text: &str) -> Option<Exchange> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let id = {
            let mut state = self.inner.lock();
            state.follow_ups.cancel_all();
            state.next_id += 1;
            let id = RequestId(state.next_id);
            state.transcript.push(Message::user(text));
            state.transcript.show_typing(id);
            id
        };
        debug!(request = %id, chars = text.len(), "message submitted");

        Some(Exchange {
            id,
            text: text.to_string(),
            inner: Arc::clone(&self.inner),
            settled: false,
        })
    }

    /// Submit and wait for the exchange to settle.
    pub async fn send(&self, text: &str) -> Option<Outcome> {
        match self.submit(text) {
            Some(exchange) => Some(exchange.resolve().await),
            None => None,
        }
    }

    /// Invoke the signup affordance on transcript row `index`: close the
    /// widget and open the signup flow.
    pub fn accept_signup_offer(&self, index: usize) -> Result<(), Error> {
        {
            let mut state = self.inner.lock();
            let offers = state
                .transcript
                .entries()
                .get(index)
                .and_then(Entry::as_message)
                .is_some_and(|m| m.offers_signup_follow_up);
            if !offers {
                return Err(Error::invalid_request(format!(
                    "row {index} does not offer signup"
                )));
            }
            Inner::close(&mut state);
        }
        self.inner.signup.open();
        Ok(())
    }

    pub fn render_transcript(&self) -> TranscriptView {
        let state = self.inner.lock();
        let rows: Vec<Row> = state
            .transcript
            .entries()
            .iter()
            .map(|entry| match entry {
                Entry::Message(m) => Row {
                    sender: m.sender,
                    text: m.text.clone(),
                    is_typing: false,
                    action: m.offers_signup_follow_up.then_some(SIGNUP_BUTTON_LABEL),
                },
                Entry::Typing(_) => Row {
                    sender: Sender::Bot,
                    text: TYPING_TEXT.to_string(),
                    is_typing: true,
                    action: None,
                },
            })
            .collect();
        let scroll_to = rows.len().checked_sub(1);
        TranscriptView { rows, scroll_to }
    }

    /// Snapshot of the committed messages, in order.
    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().transcript.messages().cloned().collect()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.inner.lock().transcript.entries().to_vec()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().transcript.pending_count()
    }

    pub fn scheduled_follow_ups(&self) -> usize {
        self.inner.lock().follow_ups.len()
    }
}

impl std::fmt::Debug for ChatWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ChatWidget")
            .field("backend", &self.inner.backend.name())
            .field("visible", &state.visible)
            .field("entries", &state.transcript.len())
            .finish()
    }
}

/// A submitted message waiting for its reply.
///
/// Dropping an exchange before it settles settles it with the fallback
/// message, so its placeholder never outlives it.
#[must_use = "an exchange settles with the fallback message if dropped unresolved"]
pub struct Exchange {
    id: RequestId,
    text: String,
    inner: Arc<Inner>,
    settled: bool,
}

impl Exchange {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub async fn resolve(mut self) -> Outcome {
        let request = ChatRequest::new(self.text.as_str()).with_context(self.inner.config.context.as_str());
        debug!(request = %self.id, backend = self.inner.backend.name(), "sending chat request");
        let result = self.inner.backend.send(request).await;
        self.settled = true;
        self.inner.settle(self.id, &self.text, result)
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if !self.settled {
            self.inner.settle(self.id, &self.text, Err(Error::Cancelled));
        }
    }
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.id)
            .field("text", &self.text)
            .field("settled", &self.settled)
            .finish()
    }
}
