//! In-memory transport: records every payload instead of sending it.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use serde_json::Value;

use crate::notify::dispatcher::{Endpoint, Transport};
use crate::utils::error::NotifyError;

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub endpoint: Endpoint,
    pub body: Value,
}

/// Clones share the same log, so a test keeps one handle and gives the other away.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    attempts: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// While failing, posts are counted but not recorded and return an error status.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Text of every delivered text message, in order.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .flat_map(|m| m.body["messages"].as_array().cloned().unwrap_or_default())
            .filter(|msg| msg["type"] == "text")
            .filter_map(|msg| msg["text"].as_str().map(str::to_string))
            .collect()
    }
}

impl Transport for MemoryTransport {
    fn post(&self, endpoint: Endpoint, body: &Value) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::Relaxed) {
            return Err(NotifyError::Status {
                status: 500,
                body: "simulated failure".to_string(),
            });
        }
        self.sent.lock().push(SentMessage {
            endpoint,
            body: body.clone(),
        });
        Ok(())
    }
}
