//! state.rs
//! Process-wide control flags shared by the command server and the sensing loop.
//!
//! Each flag is a single `AtomicBool`; every operation is exactly one atomic access.
//! There is no ordering between flags: they encode coarse, idempotent intents.
//!
//! Flag contracts:
//! - `monitoring`: multi-writer (server commands, physical toggle), multi-reader.
//!   Writers are idempotent; last write wins.
//! - `photo_requested`: written by the server, consumed (read-and-clear) by the
//!   sensing loop. `swap` makes the consume exactly-once per request.
//! - `shutdown_requested`: set-only by the server, read by the sensing loop.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

pub type SharedControl = Arc<ControlState>;

#[derive(Debug)]
pub struct ControlState {
    monitoring: AtomicBool,
    photo_requested: AtomicBool,
    shutdown_requested: AtomicBool,
}

impl ControlState {
    pub fn new() -> Self {
        Self {
            monitoring: AtomicBool::new(true),
            photo_requested: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
        }
    }

    pub fn shared() -> SharedControl {
        Arc::new(Self::new())
    }

    pub fn set_monitoring(&self, enabled: bool) {
        self.monitoring.store(enabled, Ordering::Release);
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    /// Moves `monitoring` to `enabled` if it is not already there.
    /// Returns false when the flag already held `enabled` (nothing changed).
    pub fn transition_monitoring(&self, enabled: bool) -> bool {
        self.monitoring
            .compare_exchange(!enabled, enabled, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Flips `monitoring` and returns the new value.
    pub fn toggle_monitoring(&self) -> bool {
        !self.monitoring.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn request_photo(&self) {
        self.photo_requested.store(true, Ordering::Release);
    }

    /// Reads and clears the photo request.
    pub fn consume_photo_request(&self) -> bool {
        self.photo_requested.swap(false, Ordering::AcqRel)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Release);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}
