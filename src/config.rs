//! Chat server configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! Every knob has a compiled-in default so the server starts with no
//! environment at all. Parsing goes through a lookup function rather than
//! `std::env` directly, which keeps the rules testable without mutating the
//! process environment.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 50;
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_STREAM_BODY_CAPACITY: usize = 16;
pub const DEFAULT_CHAT_TITLE: &str = "Global Chat";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    pub port: u16,
    /// Master switch for chunked streaming. When off, `/messages` serves the
    /// static rendering and `/events` is unavailable.
    pub streaming_enabled: bool,
    /// Idle interval after which a pump writes a heartbeat.
    pub keepalive: Duration,
    /// How many recent messages a snapshot returns.
    pub snapshot_limit: usize,
    /// Bounded queue size per subscriber.
    pub subscriber_capacity: usize,
    /// Chunks buffered between a pump and the HTTP body.
    pub body_capacity: usize,
    pub static_dir: Option<PathBuf>,
    pub title: String,
    /// Mark chat cookies `Secure`.
    pub cookie_secure: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            streaming_enabled: true,
            keepalive: Duration::from_secs(DEFAULT_KEEPALIVE_SECS),
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
            subscriber_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            body_capacity: DEFAULT_STREAM_BODY_CAPACITY,
            static_dir: None,
            title: DEFAULT_CHAT_TITLE.to_owned(),
            cookie_secure: false,
        }
    }
}

impl ChatConfig {
    /// Build config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `STREAMING_ENABLED`: `true` (default) / `false`
    /// - `STREAM_KEEPALIVE_SECS`: default 30
    /// - `SNAPSHOT_LIMIT`: default 50
    /// - `SUBSCRIBER_QUEUE_CAPACITY`: default 10
    /// - `STREAM_BODY_CAPACITY`: default 16
    /// - `STATIC_DIR`: serve `/static` from this directory when set
    /// - `CHAT_TITLE`: default "Global Chat"
    /// - `COOKIE_SECURE`: default `false`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a variable is present but does not
    /// parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a value is present but does not
    /// parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let keepalive_secs = env_parse(&lookup, "STREAM_KEEPALIVE_SECS", DEFAULT_KEEPALIVE_SECS)?;

        Ok(Self {
            port: env_parse(&lookup, "PORT", defaults.port)?,
            streaming_enabled: env_bool(&lookup, "STREAMING_ENABLED")?.unwrap_or(defaults.streaming_enabled),
            keepalive: Duration::from_secs(keepalive_secs.max(1)),
            snapshot_limit: env_parse(&lookup, "SNAPSHOT_LIMIT", defaults.snapshot_limit)?.max(1),
            subscriber_capacity: env_parse(&lookup, "SUBSCRIBER_QUEUE_CAPACITY", defaults.subscriber_capacity)?
                .max(1),
            body_capacity: env_parse(&lookup, "STREAM_BODY_CAPACITY", defaults.body_capacity)?.max(1),
            static_dir: lookup("STATIC_DIR")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            title: lookup("CHAT_TITLE")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.title),
            cookie_secure: env_bool(&lookup, "COOKIE_SECURE")?.unwrap_or(defaults.cookie_secure),
        })
    }
}

fn env_parse<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn env_bool<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
