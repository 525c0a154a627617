//! Error types shared across the monitor, server and hardware layers.
//!
//! Fatal vs non-fatal is decided by the caller, not the type:
//! - startup: config, hardware, capture and server errors abort the process
//! - runtime: capture errors end the sensing loop; sink, media and notify
//!   errors are logged and the loop keeps going

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required config key: {0}")]
    MissingKey(&'static str),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key,
            value: value.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Capture source unavailable: {0}")]
    Unavailable(String),

    #[error("Capture read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("Capture source closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to open media sink {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write frame: {0}")]
    Write(#[from] std::io::Error),

    #[error("Encoder exited with status {0}")]
    Encoder(String),
}

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Failed to create media directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
}

#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("GPIO pin {pin}: {source}")]
    Pin {
        pin: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected GPIO value on pin {pin}: {value:?}")]
    BadValue { pin: u8, value: String },
}

impl HardwareError {
    pub fn pin(pin: u8, source: std::io::Error) -> Self {
        HardwareError::Pin { pin, source }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Push API returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server setup failed: {0}")]
    Setup(String),
}

/// Anything that stops the process before the sensing loop runs.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("Failed to start worker thread: {0}")]
    Thread(#[from] std::io::Error),
}
