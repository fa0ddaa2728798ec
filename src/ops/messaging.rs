//! Throttled direct-message delivery to a list of targets.

use tracing::info;

use super::report::OpsReport;
use crate::batch::{ActionError, ActionResult, CancelToken};
use crate::config::OpsSettings;
use crate::telegram::TelegramOps;

/// Sends the same message to each target username, one send at a time,
/// paced by the configured delay policy.
///
/// Blank targets are recorded as skipped; per-target failures are
/// recorded in the report rather than propagated.
pub async fn send_messages(
    tg: &TelegramOps,
    targets: &[String],
    text: &str,
    settings: &OpsSettings,
    cancel: CancelToken,
) -> OpsReport {
    let mut skipped = Vec::new();
    let mut eligible = Vec::new();
    for target in targets {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            skipped.push(ActionResult::skipped(target.clone(), "blank target"));
        } else {
            eligible.push(trimmed.to_owned());
        }
    }

    info!("Sending message to {} targets", eligible.len());

    let executor = super::build_executor(settings, cancel, "send-message");
    let message = text;
    let run = executor
        .run(eligible, move |target| {
            let tg = tg;
            let text = message;
            async move {
                tg.send_direct_message(&target, text)
                    .await
                    .map_err(ActionError::from)
            }
        })
        .await;

    let report = OpsReport { skipped, run };
    report.log_summary("send-message");
    report
}
