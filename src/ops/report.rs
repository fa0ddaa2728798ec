//! Operation report combining run results with pre-run skips.

use tracing::{info, warn};

use crate::batch::{ActionResult, BatchRun};

/// Outcome of one batch operation.
#[derive(Debug, Clone)]
pub struct OpsReport {
    /// Items filtered out before the run (e.g. members without a
    /// public username).
    pub skipped: Vec<ActionResult>,

    /// The executor's run over the eligible items.
    pub run: BatchRun,
}

impl OpsReport {
    /// Number of successful items.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.run.succeeded()
    }

    /// Number of attempted-and-failed items.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.run.failed()
    }

    /// Number of items never attempted because they were filtered out.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Logs a one-line summary plus the halt reason when the run
    /// stopped early.
    pub fn log_summary(&self, operation: &str) {
        info!(
            "[{}] done: {} ok, {} failed, {} skipped ({} of {} attempted)",
            operation,
            self.succeeded(),
            self.failed(),
            self.skipped_count(),
            self.run.results.len(),
            self.run.items.len(),
        );

        if self.run.halted_early {
            warn!(
                "[{}] halted early: {}",
                operation,
                self.run.halt_reason.as_deref().unwrap_or("unknown")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Outcome;

    #[test]
    fn test_report_counts() {
        let report = OpsReport {
            skipped: vec![ActionResult::skipped("id1", "no public username")],
            run: BatchRun {
                items: vec!["a".to_owned(), "b".to_owned()],
                results: vec![
                    ActionResult {
                        item: "a".to_owned(),
                        outcome: Outcome::Success,
                    },
                    ActionResult {
                        item: "b".to_owned(),
                        outcome: Outcome::Failed("PEER_FLOOD".to_owned()),
                    },
                ],
                halted_early: false,
                halt_reason: None,
            },
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped_count(), 1);
    }
}
