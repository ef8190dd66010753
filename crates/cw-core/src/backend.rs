use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Conversation domain sent with every request from this deployment.
pub const CAMPAIGN_CONTEXT: &str = "amy_campaign";

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub context: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: CAMPAIGN_CONTEXT.to_string(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// A successful reply from the chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub reply: String,
    #[serde(default)]
    pub suggest_signup: bool,
}

impl ChatReply {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            suggest_signup: false,
        }
    }

    pub fn with_signup(mut self) -> Self {
        self.suggest_signup = true;
        self
    }
}

/// Wire shape of the response body. `reply` is optional here so that a body
/// without it maps to [`Error::MalformedResponse`] instead of a generic
/// decode failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReply {
    reply: Option<String>,
    #[serde(default)]
    suggest_signup: Option<serde_json::Value>,
}

/// Loose truthiness for the optional signup hint.
fn truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl ChatReply {
    /// Decode a response body from the chat endpoint.
    pub fn from_body(body: &str) -> Result<Self, Error> {
        let raw: RawReply =
            serde_json::from_str(body).map_err(|e| Error::malformed(e.to_string()))?;
        let reply = raw
            .reply
            .ok_or_else(|| Error::malformed("response has no reply field"))?;
        Ok(Self {
            reply,
            suggest_signup: raw.suggest_signup.as_ref().is_some_and(truthy),
        })
    }
}

/// The remote chat endpoint.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, request: ChatRequest) -> Result<ChatReply, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_with_context() {
        let request = ChatRequest::new("Hello");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"message": "Hello", "context": "amy_campaign"})
        );
    }

    #[test]
    fn test_reply_from_body() {
        let reply = ChatReply::from_body(r#"{"reply": "Hi!", "suggestSignup": true}"#).unwrap();
        assert_eq!(reply.reply, "Hi!");
        assert!(reply.suggest_signup);

        let reply = ChatReply::from_body(r#"{"reply": "Hi there!"}"#).unwrap();
        assert!(!reply.suggest_signup);
    }

    #[test]
    fn test_reply_with_loosely_typed_signup_hint() {
        let reply = ChatReply::from_body(r#"{"reply":"Hi!","suggestSignup":"true"}"#).unwrap();
        assert_eq!(reply.reply, "Hi!");
        assert!(reply.suggest_signup);

        for body in [
            r#"{"reply":"Hi!","suggestSignup":null}"#,
            r#"{"reply":"Hi!","suggestSignup":0}"#,
            r#"{"reply":"Hi!","suggestSignup":""}"#,
        ] {
            let reply = ChatReply::from_body(body).unwrap();
            assert_eq!(reply.reply, "Hi!");
            assert!(!reply.suggest_signup, "{body}");
        }
    }

    #[test]
    fn test_reply_without_reply_field_is_malformed() {
        let err = ChatReply::from_body(r#"{"suggestSignup": true}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));

        let err = ChatReply::from_body("<html>502</html>").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }
}
