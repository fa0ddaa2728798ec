//! Delay policy for throttled batch runs.
//!
//! Computes the two kinds of wait used between actions: a short
//! jittered inter-item delay, and a longer cooldown when Telegram
//! reports a flood wait. The policy only computes durations; the
//! executor is responsible for actually suspending.

use std::time::Duration;

/// Default cooldown when a rate-limit signal carries no numeric hint.
pub const DEFAULT_RATE_LIMIT_FALLBACK_SECS: u64 = 60;

/// Wait durations applied between batch actions.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct DelayPolicy {
    /// Fixed floor between consecutive actions.
    base_delay: Duration,

    /// Upper bound of the uniform random addition to the base delay.
    jitter: Duration,

    /// Cooldown used when a rate-limit signal has no embedded wait hint.
    rate_limit_fallback: Duration,
}

impl DelayPolicy {
    /// Creates a policy with the given base delay and jitter.
    #[must_use]
    pub fn new(base_delay: Duration, jitter: Duration) -> Self {
        Self {
            base_delay,
            jitter,
            rate_limit_fallback: Duration::from_secs(DEFAULT_RATE_LIMIT_FALLBACK_SECS),
        }
    }

    /// Creates a policy from millisecond values.
    #[must_use]
    pub fn from_millis(base_ms: u64, jitter_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(jitter_ms),
        )
    }

    /// Overrides the fallback cooldown for hint-less rate-limit signals.
    #[must_use]
    pub const fn with_rate_limit_fallback(mut self, fallback: Duration) -> Self {
        self.rate_limit_fallback = fallback;
        self
    }

    /// Returns the delay to apply between two consecutive actions:
    /// `base_delay + uniform(0..=jitter)`.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            fastrand::u64(0..=jitter_ms)
        };
        self.base_delay + Duration::from_millis(extra)
    }

    /// Returns the cooldown to apply after a rate-limit signal.
    ///
    /// Uses the signal's embedded wait hint when present, otherwise the
    /// configured fallback.
    #[must_use]
    pub fn cooldown(&self, hint_secs: Option<u64>) -> Duration {
        hint_secs.map_or(self.rate_limit_fallback, Duration::from_secs)
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self::from_millis(2000, 1500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_delay_within_bounds() {
        let policy = DelayPolicy::from_millis(100, 50);
        for _ in 0..100 {
            let d = policy.next_delay();
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_next_delay_zero_jitter() {
        let policy = DelayPolicy::from_millis(250, 0);
        assert_eq!(policy.next_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_cooldown_uses_hint() {
        let policy = DelayPolicy::default();
        assert_eq!(policy.cooldown(Some(30)), Duration::from_secs(30));
    }

    #[test]
    fn test_cooldown_fallback() {
        let policy = DelayPolicy::default();
        assert_eq!(
            policy.cooldown(None),
            Duration::from_secs(DEFAULT_RATE_LIMIT_FALLBACK_SECS)
        );
    }

    #[test]
    fn test_cooldown_custom_fallback() {
        let policy =
            DelayPolicy::from_millis(0, 0).with_rate_limit_fallback(Duration::from_secs(5));
        assert_eq!(policy.cooldown(None), Duration::from_secs(5));
    }
}
