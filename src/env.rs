//! Environment variable names used by this crate for convenient
//! configuration of writers from microservices.
//!
//! These are purely helpers; [`WriterConfig`] itself never reads the
//! environment unless [`WriterConfig::from_env`] is called.

use crate::config::WriterConfig;
use crate::error::{BridgeError, Result};
use crate::severity::Severity;
use std::time::Duration;

/// Sentry DSN, e.g. `https://key@o0.ingest.sentry.io/0`.
pub const SENTRY_DSN_ENV: &str = "SENTRY_DSN";

pub const SENTRY_RELEASE_ENV: &str = "SENTRY_RELEASE";

pub const SENTRY_ENVIRONMENT_ENV: &str = "SENTRY_ENVIRONMENT";

/// Comma-separated severities to report, e.g. `warn,error,fatal`.
pub const LOG_SENTRY_LEVELS_ENV: &str = "LOG_SENTRY_LEVELS";

/// Event sample rate in `[0, 1]`.
pub const LOG_SENTRY_SAMPLE_RATE_ENV: &str = "LOG_SENTRY_SAMPLE_RATE";

/// Flush timeout in milliseconds.
pub const LOG_SENTRY_FLUSH_TIMEOUT_MS_ENV: &str = "LOG_SENTRY_FLUSH_TIMEOUT_MS";

/// `true`/`1` enables the Sentry client's debug output.
pub const LOG_SENTRY_DEBUG_ENV: &str = "LOG_SENTRY_DEBUG";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl WriterConfig {
    /// Default configuration overlaid with the variables listed in this
    /// module.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`WriterConfig::from_env`], reading values through `lookup`.
    /// Unset and blank values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = WriterConfig::default();

        if let Some(release) = get(SENTRY_RELEASE_ENV) {
            cfg.release = Some(release);
        }
        if let Some(environment) = get(SENTRY_ENVIRONMENT_ENV) {
            cfg.environment = Some(environment);
        }
        if let Some(levels) = get(LOG_SENTRY_LEVELS_ENV) {
            cfg.levels = levels
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| l.parse::<Severity>().map_err(|e| BridgeError::config(LOG_SENTRY_LEVELS_ENV, e)))
                .collect::<Result<_>>()?;
        }
        if let Some(rate) = get(LOG_SENTRY_SAMPLE_RATE_ENV) {
            cfg.sample_rate = rate
                .parse()
                .map_err(|_| BridgeError::config(LOG_SENTRY_SAMPLE_RATE_ENV, format!("not a number: '{}'", rate)))?;
        }
        if let Some(ms) = get(LOG_SENTRY_FLUSH_TIMEOUT_MS_ENV) {
            let ms: u64 = ms.parse().map_err(|_| {
                BridgeError::config(LOG_SENTRY_FLUSH_TIMEOUT_MS_ENV, format!("not a millisecond count: '{}'", ms))
            })?;
            cfg.flush_timeout = Duration::from_millis(ms);
        }
        if let Some(debug) = get(LOG_SENTRY_DEBUG_ENV) {
            cfg.debug = matches!(debug.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        cfg.validate()?;
        Ok(cfg)
    }
}
