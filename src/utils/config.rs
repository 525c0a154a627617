//! config.rs
//! Line-oriented `key=value` configuration.
//!
//! - Blank lines and `#` comments are skipped, as are lines without `=`
//! - Key is everything before the first `=`; value is the rest (trimmed)
//! - Later duplicates override earlier ones

use std::{collections::HashMap, fs, net::SocketAddr, path::PathBuf, str::FromStr};

use crate::utils::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "../config.txt";

const KEY_ACCESS_TOKEN: &str = "CHANNEL_ACCESS_TOKEN";
const KEY_RECIPIENT: &str = "USER_ID_TO_SEND";
const KEY_PUBLIC_BASE: &str = "NGROK_URL_BASE";

/// Which digital I/O implementation drives the indicators and buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioBackend {
    Sysfs,
    Simulated,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub access_token: String,
    pub recipient: String,
    /// Public base URL for media links, always with a scheme.
    pub public_base_url: String,
    pub api_base_url: String,
    pub bind_addr: SocketAddr,
    pub photo_dir: PathBuf,
    pub video_dir: PathBuf,
    pub camera_device: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub frame_rate: u32,
    pub gpio_backend: GpioBackend,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw = parse_pairs(text);

        let required = |key: &'static str| -> Result<String, ConfigError> {
            raw.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or(ConfigError::MissingKey(key))
        };
        let optional = |key: &str, default: &str| -> String {
            raw.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let access_token = required(KEY_ACCESS_TOKEN)?;
        let recipient = required(KEY_RECIPIENT)?;
        let public_base_url = with_scheme(&required(KEY_PUBLIC_BASE)?);

        let bind_host = optional("SERVER_BIND", "0.0.0.0");
        let port: u16 = parse_number(&raw, "SERVER_PORT", 8080)?;
        let bind_addr = format!("{}:{}", bind_host, port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::invalid("SERVER_BIND", bind_host.clone()))?;

        let gpio_backend = match optional("GPIO_BACKEND", "sysfs").as_str() {
            "sysfs" => GpioBackend::Sysfs,
            "simulated" => GpioBackend::Simulated,
            other => return Err(ConfigError::invalid("GPIO_BACKEND", other)),
        };

        Ok(Self {
            access_token,
            recipient,
            public_base_url,
            api_base_url: optional("LINE_API_BASE_URL", "https://api.line.me")
                .trim_end_matches('/')
                .to_string(),
            bind_addr,
            photo_dir: PathBuf::from(optional("PHOTO_DIR", "../line_photo")),
            video_dir: PathBuf::from(optional("VIDEO_DIR", "../line_video")),
            camera_device: optional("CAMERA_DEVICE", "/dev/video0"),
            frame_width: parse_number(&raw, "FRAME_WIDTH", 800)?,
            frame_height: parse_number(&raw, "FRAME_HEIGHT", 600)?,
            frame_rate: parse_number(&raw, "FRAME_RATE", 15)?,
            gpio_backend,
        })
    }
}

fn parse_pairs(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    map
}

fn parse_number<T: FromStr>(
    raw: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw.get(key).filter(|v| !v.is_empty()) {
        Some(v) => v.parse::<T>().map_err(|_| ConfigError::invalid(key, v.clone())),
        None => Ok(default),
    }
}

fn with_scheme(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        format!("https://{}", base)
    }
}
