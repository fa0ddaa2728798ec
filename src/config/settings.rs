//! Application settings and Telegram API configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Directory holding per-account session files and the registry.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: PathBuf,
}

fn default_sessions_dir() -> PathBuf {
    PathBuf::from("sessions")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String) -> Self {
        Self {
            api_id,
            api_hash,
            sessions_dir: default_sessions_dir(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID` and `TG_API_HASH` to be set.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let sessions_dir = std::env::var("TG_SESSIONS_DIR")
            .map_or_else(|_| default_sessions_dir(), PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            sessions_dir,
        })
    }
}

/// Throttling settings for batch operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsSettings {
    /// Fixed floor between consecutive actions, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound of the random addition to the base delay, in milliseconds.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Cooldown applied when a flood wait carries no duration hint, in seconds.
    #[serde(default = "default_flood_fallback_secs")]
    pub flood_fallback_secs: u64,

    /// Consecutive failures after which a batch halts.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: usize,
}

fn default_base_delay_ms() -> u64 {
    2000
}

fn default_jitter_ms() -> u64 {
    1500
}

fn default_flood_fallback_secs() -> u64 {
    60
}

fn default_max_consecutive_failures() -> usize {
    5
}

impl Default for OpsSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
            flood_fallback_secs: default_flood_fallback_secs(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl OpsSettings {
    /// Creates throttling settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            base_delay_ms: std::env::var("OPS_BASE_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_base_delay_ms),
            jitter_ms: std::env::var("OPS_JITTER_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_jitter_ms),
            flood_fallback_secs: std::env::var("OPS_FLOOD_FALLBACK_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_flood_fallback_secs),
            max_consecutive_failures: std::env::var("OPS_MAX_CONSECUTIVE_FAILURES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_consecutive_failures),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ops_settings() {
        let settings = OpsSettings::default();
        assert_eq!(settings.base_delay_ms, 2000);
        assert_eq!(settings.jitter_ms, 1500);
        assert_eq!(settings.flood_fallback_secs, 60);
        assert_eq!(settings.max_consecutive_failures, 5);
    }

    #[test]
    fn test_telegram_config_new() {
        let config = TelegramConfig::new(12345, "abc123".to_owned());
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.api_hash, "abc123");
        assert_eq!(config.sessions_dir, PathBuf::from("sessions"));
    }
}
