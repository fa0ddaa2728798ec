//! Throttled batch execution.
//!
//! The one piece of this console with real sequencing logic: a
//! sequential executor that paces single-item actions (invites,
//! messages) against Telegram's rate limits, classifies per-item
//! failures, and halts early on fatal errors or consecutive-failure
//! streaks.

mod classify;
mod delay;
mod executor;

pub use classify::{ActionError, Classification, classify, extract_flood_wait_seconds};
pub use delay::{DEFAULT_RATE_LIMIT_FALLBACK_SECS, DelayPolicy};
pub use executor::{
    ActionResult, BatchExecutor, BatchProgress, BatchRun, CancelToken,
    DEFAULT_CONSECUTIVE_FAILURE_LIMIT, HALT_CANCELLED, HALT_TOO_MANY_FAILURES, Outcome,
};
