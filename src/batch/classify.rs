//! Classification of single-action failures.
//!
//! Telegram reports rejections as RPC error strings (`FLOOD_WAIT_30`,
//! `PEER_FLOOD`, `USER_PRIVACY_RESTRICTED`, ...). The matching rules
//! live here so the executor can route outcomes without string-matching
//! scattered through the call sites.

use thiserror::Error;

/// Error returned by one attempt of a single-item action.
///
/// Carries the transport's reason tag so the classifier can inspect it.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ActionError {
    /// Raw reason string as reported by the transport.
    pub reason: String,
}

impl ActionError {
    /// Creates an action error from any displayable reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// How a failed attempt should be handled by the batch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Transient rate limit; cool down for the hinted duration then continue.
    RateLimited {
        /// Wait seconds embedded in the signal, if any.
        wait_secs: Option<u64>,
    },

    /// Permanent for this item only; skip it and continue.
    Rejected {
        /// Reason tag recorded in the item's result.
        reason: String,
    },

    /// Unrecoverable within this run; halt the batch.
    Fatal {
        /// Reason recorded as the halt reason.
        reason: String,
    },
}

/// Reason tags that reject a single item but leave the run healthy.
const REJECTED_TAGS: &[&str] = &[
    "USER_PRIVACY_RESTRICTED",
    "PEER_FLOOD",
    "USER_NOT_MUTUAL_CONTACT",
    "USER_CHANNELS_TOO_MUCH",
    "USERS_TOO_MUCH",
    "USER_BOT",
    "INPUT_USER_DEACTIVATED",
    "USER_BANNED_IN_CHANNEL",
    "CHAT_WRITE_FORBIDDEN",
    "USERNAME_NOT_OCCUPIED",
    "USERNAME_INVALID",
];

/// Reason tags that invalidate the whole session or connection.
const FATAL_TAGS: &[&str] = &[
    "AUTH_KEY_UNREGISTERED",
    "SESSION_REVOKED",
    "SESSION_EXPIRED",
    "USER_DEACTIVATED",
    "Not authorized",
    "Connection error",
];

/// Classifies a failed attempt by its transport reason tag.
///
/// Unmatched errors default to `Rejected` so an unexpected error on one
/// item never silently aborts a large batch; `Fatal` is reserved for
/// authentication and connection failures.
#[must_use]
pub fn classify(err: &ActionError) -> Classification {
    let reason = err.reason.as_str();

    if reason.contains("FLOOD_WAIT") || reason.to_lowercase().contains("flood wait") {
        return Classification::RateLimited {
            wait_secs: extract_flood_wait_seconds(reason).map(u64::from),
        };
    }

    for tag in FATAL_TAGS {
        if reason.contains(tag) {
            return Classification::Fatal {
                reason: (*tag).to_owned(),
            };
        }
    }

    for tag in REJECTED_TAGS {
        if reason.contains(tag) {
            return Classification::Rejected {
                reason: (*tag).to_owned(),
            };
        }
    }

    Classification::Rejected {
        reason: reason.to_owned(),
    }
}

/// Extracts flood wait seconds from an error message.
#[must_use]
pub fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];

    for pattern in patterns {
        if let Some(idx) = err_msg.to_lowercase().find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = err_msg[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}
