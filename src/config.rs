//! Configuration loading from environment variables or TOML.
//!
//! Values are read from `COURIER_*` environment variables with sensible
//! defaults. Invalid values fall back to defaults without failing, and
//! out-of-range values are clamped.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `COURIER_WORKERS` | 5 | Dispatcher threads (1..=64) |
//! | `COURIER_CONNECT_TIMEOUT_MS` | 10000 | TCP connect timeout |
//! | `COURIER_TIMEOUT_MS` | 30000 | Whole-exchange timeout |
//! | `COURIER_USER_AGENT` | courier/1 | User-Agent header |
//! | `COURIER_MAX_REDIRECTS` | 10 | Redirect hops (0 disables following) |
//! | `COURIER_COOKIES` | false | Keep a cookie store across requests |
//! | `COURIER_LOG_LEVEL` | info | Tracing filter directive |
//! | `COURIER_LOG_FORMAT` | json | `json` or `pretty` |
//!
//! The same keys, lowercased and without the prefix, are accepted by
//! [`from_toml_str`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::{RequestQueueConfig, DEFAULT_WORKER_COUNT};
use crate::telemetry::{LogConfig, LogFormat};
use crate::transport::{RedirectPolicy, TransportConfig, DEFAULT_USER_AGENT};

const MAX_WORKERS: usize = 64;
const MAX_REDIRECT_HOPS: usize = 100;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Configuration failures. Only file-based loading reports errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub workers: usize,
    pub connect_timeout_ms: u64,
    pub timeout_ms: u64,
    pub user_agent: String,
    pub max_redirects: usize,
    pub cookies: bool,
    pub log_level: String,
    pub log_format: LogFormat,
}

/// All settings, resolved and clamped.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub request_queue: RequestQueueConfig,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
    pub cookies: bool,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::resolve(RawSettings::default())
    }
}

/// Unresolved settings as they appear in a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    workers: Option<usize>,
    connect_timeout_ms: Option<u64>,
    timeout_ms: Option<u64>,
    user_agent: Option<String>,
    max_redirects: Option<usize>,
    cookies: Option<bool>,
    log_level: Option<String>,
    log_format: Option<LogFormat>,
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/0`, `true/false`, `yes/no`, `on/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    EnvConfig::resolve(RawSettings {
        workers: Some(parse_usize("COURIER_WORKERS", DEFAULT_WORKER_COUNT)),
        connect_timeout_ms: Some(parse_u64("COURIER_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)),
        timeout_ms: Some(parse_u64("COURIER_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)),
        user_agent: non_empty_var("COURIER_USER_AGENT"),
        max_redirects: Some(parse_usize("COURIER_MAX_REDIRECTS", DEFAULT_MAX_REDIRECTS)),
        cookies: Some(parse_bool("COURIER_COOKIES", false)),
        log_level: non_empty_var("COURIER_LOG_LEVEL"),
        log_format: non_empty_var("COURIER_LOG_FORMAT").and_then(|v| v.parse().ok()),
    })
}

/// Parse settings from TOML. Unknown keys and malformed values are errors;
/// absent keys take their defaults.
pub fn from_toml_str(input: &str) -> Result<EnvConfig, ConfigError> {
    let raw: RawSettings = toml::from_str(input)?;
    if let Some(level) = &raw.log_level {
        if level.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "log_level",
                reason: "must not be empty".into(),
            });
        }
    }
    Ok(EnvConfig::resolve(raw))
}

/// Read and parse a TOML config file.
pub fn load_file(path: &Path) -> Result<EnvConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    from_toml_str(&contents)
}

impl EnvConfig {
    fn resolve(raw: RawSettings) -> Self {
        let workers = raw.workers.unwrap_or(DEFAULT_WORKER_COUNT).clamp(1, MAX_WORKERS);
        let connect_ms = raw.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS).max(1);
        let timeout_ms = raw.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS).max(1);
        let max_redirects = raw.max_redirects.unwrap_or(DEFAULT_MAX_REDIRECTS).min(MAX_REDIRECT_HOPS);

        Self {
            request_queue: RequestQueueConfig { worker_count: workers },
            connect_timeout: Duration::from_millis(connect_ms),
            timeout: Duration::from_millis(timeout_ms),
            user_agent: raw.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            max_redirects,
            cookies: raw.cookies.unwrap_or(false),
            log_level: raw.log_level.unwrap_or_else(|| "info".to_string()),
            log_format: raw.log_format.unwrap_or_default(),
        }
    }

    /// Transport settings without interceptors.
    pub fn transport_config(&self) -> TransportConfig {
        let redirect = match self.max_redirects {
            0 => RedirectPolicy::None,
            hops => RedirectPolicy::Limited(hops),
        };
        TransportConfig {
            connect_timeout: self.connect_timeout,
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
            redirect,
            cookie_store: self.cookies,
            ..TransportConfig::default()
        }
    }

    pub fn queue_config(&self) -> RequestQueueConfig {
        self.request_queue.clone()
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            format: self.log_format,
            level: self.log_level.clone(),
            output_path: None,
        }
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            workers: self.request_queue.worker_count,
            connect_timeout_ms: self.connect_timeout.as_millis() as u64,
            timeout_ms: self.timeout.as_millis() as u64,
            user_agent: self.user_agent.clone(),
            max_redirects: self.max_redirects,
            cookies: self.cookies,
            log_level: self.log_level.clone(),
            log_format: self.log_format,
        }
    }
}
