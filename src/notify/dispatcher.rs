//! dispatcher.rs
//! Best-effort push notifications over the LINE Messaging API.
//!
//! Contract:
//! - One outbound call per send, 5 s connect timeout, 10 s total timeout
//! - Returns false on any transport error or non-2xx status; never retries
//! - Failures are logged here and never propagate to the caller's state

use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;

use crate::utils::error::NotifyError;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Push,
    Reply,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Push => "/v2/bot/message/push",
            Endpoint::Reply => "/v2/bot/message/reply",
        }
    }
}

/// A single outbound POST to the push service.
pub trait Transport: Send + Sync {
    fn post(&self, endpoint: Endpoint, body: &Value) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "originalContentUrl")]
        original_content_url: String,
        #[serde(rename = "previewImageUrl")]
        preview_image_url: String,
    },
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    #[serde(rename = "replyToken")]
    reply_token: &'a str,
    messages: Vec<Message>,
}

/// Blocking HTTPS transport authenticated with a channel access token.
pub struct LineTransport {
    client: Client,
    api_base: String,
    access_token: String,
}

impl LineTransport {
    pub fn new(api_base: &str, access_token: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(READ_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }
}

impl Transport for LineTransport {
    fn post(&self, endpoint: Endpoint, body: &Value) -> Result<(), NotifyError> {
        let url = format!("{}{}", self.api_base, endpoint.path());
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text().unwrap_or_default();
        if status.is_success() {
            debug!("[Notify] {} ok: {}", endpoint.path(), text);
            Ok(())
        } else {
            Err(NotifyError::Status {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

/// Uniform best-effort front for the push transport.
/// Shared by the command server (replies) and the notification outbox.
pub struct NotificationDispatcher {
    transport: Box<dyn Transport>,
    public_base_url: String,
}

impl NotificationDispatcher {
    pub fn new(transport: impl Transport + 'static, public_base_url: &str) -> Self {
        Self {
            transport: Box::new(transport),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn image_url(&self, file_name: &str) -> String {
        format!("{}/image?file={}", self.public_base_url, file_name)
    }

    pub fn video_url(&self, file_name: &str) -> String {
        format!("{}/video?file={}", self.public_base_url, file_name)
    }

    pub fn send_text(&self, user_id: &str, text: &str) -> bool {
        let payload = PushRequest {
            to: user_id,
            messages: vec![Message::Text {
                text: text.to_string(),
            }],
        };
        self.deliver(Endpoint::Push, &payload, "text")
    }

    /// Sends the photo `file_name` (as served by `/image`) as an image message.
    pub fn send_image(&self, user_id: &str, file_name: &str) -> bool {
        let url = self.image_url(file_name);
        let payload = PushRequest {
            to: user_id,
            messages: vec![Message::Image {
                original_content_url: url.clone(),
                preview_image_url: url,
            }],
        };
        self.deliver(Endpoint::Push, &payload, "image")
    }

    pub fn send_reply(&self, reply_token: &str, text: &str) -> bool {
        let payload = ReplyRequest {
            reply_token,
            messages: vec![Message::Text {
                text: text.to_string(),
            }],
        };
        self.deliver(Endpoint::Reply, &payload, "reply")
    }

    fn deliver(&self, endpoint: Endpoint, payload: &impl Serialize, kind: &str) -> bool {
        let body = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!("[Notify] failed to encode {} payload: {}", kind, e);
                return false;
            }
        };

        match self.transport.post(endpoint, &body) {
            Ok(()) => {
                debug!("[Notify] {} message delivered", kind);
                true
            }
            Err(e) => {
                warn!("[Notify] {} message failed: {}", kind, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::memory::MemoryTransport;
    use serde_json::json;

    fn dispatcher() -> (NotificationDispatcher, MemoryTransport) {
        let transport = MemoryTransport::new();
        let d = NotificationDispatcher::new(transport.clone(), "https://cam.example/");
        (d, transport)
    }

    #[test]
    fn text_payload_shape() {
        let (d, t) = dispatcher();
        assert!(d.send_text("U1", "hello \"world\""));

        let sent = t.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].endpoint, Endpoint::Push);
        assert_eq!(
            sent[0].body,
            json!({"to": "U1", "messages": [{"type": "text", "text": "hello \"world\""}]})
        );
    }

    #[test]
    fn image_payload_points_at_media_endpoint() {
        let (d, t) = dispatcher();
        assert!(d.send_image("U1", "2024_01_02--03_04_05.jpg"));

        let url = "https://cam.example/image?file=2024_01_02--03_04_05.jpg";
        assert_eq!(
            t.sent()[0].body,
            json!({"to": "U1", "messages": [{
                "type": "image",
                "originalContentUrl": url,
                "previewImageUrl": url
            }]})
        );
    }

    #[test]
    fn reply_is_addressed_by_token() {
        let (d, t) = dispatcher();
        assert!(d.send_reply("tok-9", "ok"));

        let sent = t.sent();
        assert_eq!(sent[0].endpoint, Endpoint::Reply);
        assert_eq!(
            sent[0].body,
            json!({"replyToken": "tok-9", "messages": [{"type": "text", "text": "ok"}]})
        );
    }

    #[test]
    fn transport_failure_returns_false() {
        let (d, t) = dispatcher();
        t.set_failing(true);
        assert!(!d.send_text("U1", "x"));
        assert!(!d.send_reply("tok", "x"));
        // one attempt each, no retries
        assert_eq!(t.attempts(), 2);
    }

    #[test]
    fn video_url_uses_public_base() {
        let (d, _) = dispatcher();
        assert_eq!(d.video_url("a.mp4"), "https://cam.example/video?file=a.mp4");
    }

    #[test]
    fn unreachable_endpoint_fails_without_panicking() {
        // port 9 (discard) on localhost is closed on test machines
        let transport = LineTransport::new("http://127.0.0.1:9", "token").unwrap();
        let d = NotificationDispatcher::new(transport, "https://cam.example");
        assert!(!d.send_text("U1", "x"));
    }
}
