//! Configuration module for the group-ops console.
//!
//! Handles Telegram API credentials and the throttling settings that
//! feed the batch executor's delay policy.

mod settings;

pub use settings::{ConfigError, OpsSettings, TelegramConfig};

impl OpsSettings {
    /// Builds the batch delay policy configured by these settings.
    #[must_use]
    pub fn delay_policy(&self) -> crate::batch::DelayPolicy {
        crate::batch::DelayPolicy::from_millis(self.base_delay_ms, self.jitter_ms)
            .with_rate_limit_fallback(std::time::Duration::from_secs(self.flood_fallback_secs))
    }
}
