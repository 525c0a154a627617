//! Outbound notifications: payload building, transports, and the
//! non-blocking outbox the sensing loop posts into.

pub mod dispatcher;
pub mod memory;
pub mod outbox;
