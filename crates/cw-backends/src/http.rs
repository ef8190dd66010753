use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use cw_core::{ChatBackend, ChatReply, ChatRequest, Error};

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const CHAT_PATH: &str = "/api/chat";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Talks to the campaign site's `POST /api/chat` endpoint.
pub struct HttpChatBackend {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpChatBackend {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), CHAT_PATH)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::timeout(format!("no reply within {:?}", self.timeout))
        } else {
            Error::network(err.to_string())
        }
    }

    fn parse_error(&self, status: u16, body: &str) -> Error {
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: String,
        }

        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(err) => Error::api(status, err.error),
            Err(_) => Error::api(status, body.trim().to_string()),
        }
    }
}

impl Default for HttpChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatReply, Error> {
        debug!("Chat request: {:?}", request);

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let reply = ChatReply::from_body(&body)?;
        debug!(suggest_signup = reply.suggest_signup, "Chat reply received");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cw_core::testing::RecordingSink;
    use cw_core::{ChatWidget, Message};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).into_owned()
        });

        (format!("http://{addr}"), handle)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        buf.len() >= header_end + 4 + content_length
    }

    #[test]
    fn test_backend_creation() {
        let backend = HttpChatBackend::new();
        assert_eq!(backend.name(), "http");
        assert_eq!(backend.base_url(), "http://localhost:3000");
        assert_eq!(backend.endpoint(), "http://localhost:3000/api/chat");
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let backend = HttpChatBackend::new().with_base_url("https://amyphanwest.com/");
        assert_eq!(backend.endpoint(), "https://amyphanwest.com/api/chat");
    }

    #[test]
    fn test_parse_error() {
        let backend = HttpChatBackend::new();
        let err = backend.parse_error(500, r#"{"error": "upstream down"}"#);
        assert!(matches!(err, Error::Api { status: 500, ref message } if message == "upstream down"));

        let err = backend.parse_error(502, "Bad Gateway\n");
        assert!(matches!(err, Error::Api { status: 502, ref message } if message == "Bad Gateway"));
    }

    #[tokio::test]
    async fn test_send_posts_json_and_parses_reply() {
        let (url, server) = serve_once("200 OK", r#"{"reply":"Hi!","suggestSignup":true}"#).await;
        let backend = HttpChatBackend::new().with_base_url(url);

        let reply = backend.send(ChatRequest::new("Hello")).await.unwrap();
        assert_eq!(reply, ChatReply::new("Hi!").with_signup());

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/chat HTTP/1.1"));
        assert!(raw.contains(r#"{"message":"Hello","context":"amy_campaign"}"#));
    }

    #[tokio::test]
    async fn test_send_rejects_missing_reply() {
        let (url, _server) = serve_once("200 OK", r#"{"answer":"Hi!"}"#).await;
        let backend = HttpChatBackend::new().with_base_url(url);

        let err = backend.send(ChatRequest::new("Hello")).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_send_maps_error_status() {
        let (url, _server) = serve_once("503 Service Unavailable", r#"{"error":"busy"}"#).await;
        let backend = HttpChatBackend::new().with_base_url(url);

        let err = backend.send(ChatRequest::new("Hello")).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let backend = HttpChatBackend::new().with_base_url(format!("http://{addr}"));

        let err = backend.send(ChatRequest::new("Hello")).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_widget_falls_back_on_server_error() {
        let (url, _server) = serve_once("500 Internal Server Error", "oops").await;
        let sink = Arc::new(RecordingSink::new());
        let widget = ChatWidget::builder(Arc::new(HttpChatBackend::new().with_base_url(url)))
            .with_analytics(sink.clone())
            .build();

        widget.send("Hello").await;
        assert_eq!(
            widget.messages(),
            vec![
                Message::user("Hello"),
                Message::bot(cw_core::widget::FALLBACK_REPLY)
            ]
        );
        assert_eq!(widget.pending_count(), 0);
        assert!(sink.events().is_empty());
    }
}
