//! command.rs
//! Remote commands delivered through the messaging webhook.
//!
//! Text is classified by exact match against a fixed vocabulary (each command
//! has an ASCII form and the Japanese form used by the original deployment).
//! Executing a command touches only `ControlState` and yields an optional reply.

use log::{info, warn};
use serde::Deserialize;

use crate::control::state::ControlState;
use crate::notify::dispatcher::NotificationDispatcher;

pub const REPLY_PHOTO_UNAVAILABLE: &str =
    "Monitoring is stopped, so photos are unavailable.";
pub const REPLY_STATUS_RUNNING: &str = "Monitoring is running.";
pub const REPLY_STATUS_STOPPED: &str = "Monitoring is stopped.";
pub const REPLY_ALREADY_STOPPED: &str = "Monitoring is already stopped.";
pub const REPLY_STOPPING: &str =
    "Stopping monitoring. Photos and videos are unavailable until it resumes.";
pub const REPLY_ALREADY_RUNNING: &str = "Monitoring is already running.";
pub const REPLY_RESUMING: &str = "Resuming monitoring.";
pub const HELP_TEXT: &str = "You can send these commands:\n\
[!] Take a photo and send it here\n\
[?] Show whether monitoring is running\n\
[stop monitoring] Pause monitoring until resumed\n\
[resume monitoring] Resume monitoring\n\
[shutdown] Stop the camera program";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RequestPhoto,
    QueryStatus,
    StopMonitoring,
    ResumeMonitoring,
    Shutdown,
    Unknown,
}

impl Command {
    /// Exact, case-sensitive match; surrounding whitespace is significant.
    pub fn classify(text: &str) -> Self {
        match text {
            "!" | "！" => Command::RequestPhoto,
            "?" | "？" => Command::QueryStatus,
            "stop monitoring" | "監視停止" => Command::StopMonitoring,
            "resume monitoring" | "監視再開" => Command::ResumeMonitoring,
            "shutdown" | "プログラム終了" => Command::Shutdown,
            _ => Command::Unknown,
        }
    }

    /// Applies the command to the control flags and returns the reply to send, if any.
    pub fn execute(self, control: &ControlState) -> Option<&'static str> {
        match self {
            Command::RequestPhoto => {
                // the request is recorded either way; the loop serves it when it can
                control.request_photo();
                (!control.is_monitoring()).then_some(REPLY_PHOTO_UNAVAILABLE)
            }
            Command::QueryStatus => Some(if control.is_monitoring() {
                REPLY_STATUS_RUNNING
            } else {
                REPLY_STATUS_STOPPED
            }),
            Command::StopMonitoring => Some(if control.transition_monitoring(false) {
                info!("[Server] monitoring stopped by remote command");
                REPLY_STOPPING
            } else {
                REPLY_ALREADY_STOPPED
            }),
            Command::ResumeMonitoring => Some(if control.transition_monitoring(true) {
                info!("[Server] monitoring resumed by remote command");
                REPLY_RESUMING
            } else {
                REPLY_ALREADY_RUNNING
            }),
            Command::Shutdown => {
                info!("[Server] shutdown requested by remote command");
                control.request_shutdown();
                None
            }
            Command::Unknown => Some(HELP_TEXT),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(rename = "replyToken", default)]
    pub reply_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WebhookEvent {
    /// Text of a text-message event; None for every other event shape.
    pub fn text(&self) -> Option<&str> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.kind != "text" {
            return None;
        }
        message.text.as_deref()
    }
}

pub fn parse_webhook(body: &[u8]) -> Result<WebhookBody, serde_json::Error> {
    serde_json::from_slice(body)
}

/// Executes every text command in `webhook` in order and sends replies.
/// Reply failures are logged only. Returns the number of commands executed.
pub fn handle_events(
    webhook: &WebhookBody,
    control: &ControlState,
    notifier: &NotificationDispatcher,
) -> usize {
    let mut executed = 0;
    for event in &webhook.events {
        let Some(text) = event.text() else {
            continue;
        };
        let command = Command::classify(text);
        info!("[Server] message {:?} -> {:?}", text, command);
        executed += 1;

        let Some(reply) = command.execute(control) else {
            continue;
        };
        match event.reply_token.as_deref() {
            Some(token) => {
                if !notifier.send_reply(token, reply) {
                    warn!("[Server] reply for {:?} was not delivered", command);
                }
            }
            None => warn!("[Server] {:?} has no reply token, reply skipped", command),
        }
    }
    executed
}
