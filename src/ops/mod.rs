//! High-level account operations.
//!
//! Each operation pairs a single-item transport call from
//! [`crate::telegram`] with the throttled batch executor, so the pacing
//! and failure handling live in exactly one place.

mod add_members;
mod messaging;
mod report;
mod spam;

pub use add_members::add_members;
pub use messaging::send_messages;
pub use report::OpsReport;
pub use spam::{SpamStatus, SpamVerdict, check_spam, interpret_spam_reply};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::batch::{BatchExecutor, BatchProgress, CancelToken, Outcome};
use crate::config::OpsSettings;

/// Builds an executor wired to the settings, a cancel token and a
/// tracing-backed progress logger.
fn build_executor(
    settings: &OpsSettings,
    cancel: CancelToken,
    operation: &'static str,
) -> BatchExecutor {
    BatchExecutor::new(settings.delay_policy())
        .with_consecutive_failure_limit(settings.max_consecutive_failures)
        .with_cancel_token(cancel)
        .with_progress(spawn_progress_logger(operation))
}

/// Spawns a task that logs each per-item progress event.
fn spawn_progress_logger(operation: &'static str) -> mpsc::UnboundedSender<BatchProgress> {
    let (tx, mut rx) = mpsc::unbounded_channel::<BatchProgress>();

    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            match &ev.outcome {
                Outcome::Success => info!(
                    "[{}] {}/{} '{}' ok",
                    operation,
                    ev.index + 1,
                    ev.total,
                    ev.item
                ),
                Outcome::Failed(reason) => warn!(
                    "[{}] {}/{} '{}' failed: {}",
                    operation,
                    ev.index + 1,
                    ev.total,
                    ev.item,
                    reason
                ),
                Outcome::Skipped(reason) => info!(
                    "[{}] {}/{} '{}' skipped: {}",
                    operation,
                    ev.index + 1,
                    ev.total,
                    ev.item,
                    reason
                ),
            }
        }
    });

    tx
}
