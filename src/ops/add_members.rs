//! Throttled mass-adding of scraped members into a target group.

use tracing::info;

use super::report::OpsReport;
use crate::batch::{ActionError, ActionResult, CancelToken};
use crate::config::OpsSettings;
use crate::telegram::{ScrapedMember, TelegramError, TelegramOps};

/// Adds scraped members to the target group, one invite at a time,
/// paced by the configured delay policy.
///
/// Members without a public username are recorded as skipped instead of
/// being silently dropped.
///
/// # Errors
///
/// Returns an error if the target group cannot be resolved; per-member
/// failures are recorded in the report instead.
pub async fn add_members(
    tg: &TelegramOps,
    target: &str,
    members: &[ScrapedMember],
    settings: &OpsSettings,
    cancel: CancelToken,
) -> Result<OpsReport, TelegramError> {
    let group = tg.resolve_group(target).await?;

    let mut skipped = Vec::new();
    let mut eligible = Vec::new();
    for member in members {
        match member.username.as_deref() {
            Some(username) if !username.is_empty() => eligible.push(username.to_owned()),
            _ => skipped.push(ActionResult::skipped(
                format!("id{}", member.id),
                "no public username",
            )),
        }
    }

    info!(
        "Adding {} members to '{}' ({} skipped without username)",
        eligible.len(),
        group.name(),
        skipped.len()
    );

    let executor = super::build_executor(settings, cancel, "add-members");
    let group_ref = &group;
    let run = executor
        .run(eligible, move |username| {
            let tg = tg;
            let group = group_ref;
            async move {
                tg.invite_to_group(group, &username)
                    .await
                    .map_err(ActionError::from)
            }
        })
        .await;

    let report = OpsReport { skipped, run };
    report.log_summary("add-members");
    Ok(report)
}
