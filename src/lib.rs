//! # picam_guard
//!
//! Presence-triggered camera recorder with remote control over a messaging
//! webhook and a two-LED, two-button operator panel.
//!
//! ## Execution contexts
//! - **Command server:** `server::http`, one thread per request
//! - **Sensing loop:** `monitor::sensing`, one iteration per frame
//! - **Notification worker:** `notify::outbox`, drains queued push messages
//!
//! The contexts share nothing but `control::state::ControlState`.

pub mod control;
pub mod hardware;
pub mod media;
pub mod monitor;
pub mod notify;
pub mod server;
pub mod utils;
