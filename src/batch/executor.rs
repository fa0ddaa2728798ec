//! Throttled batch executor.
//!
//! Drives a sequence of single-item actions against an injected
//! transport call, strictly in input order, applying the delay policy
//! between attempts and routing classified failures to
//! continue/skip/halt decisions. Sequential-with-cooldown on purpose:
//! Telegram penalizes bursty automated behavior, so correctness here
//! means "never act faster than policy allows", not throughput.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::classify::{ActionError, Classification, classify};
use super::delay::DelayPolicy;

/// Consecutive-failure count that halts a run.
///
/// Five failures in a row almost always mean the account has tripped
/// platform-side abuse detection; continuing only makes a ban more
/// likely.
pub const DEFAULT_CONSECUTIVE_FAILURE_LIMIT: usize = 5;

/// Halt reason recorded when the consecutive-failure valve trips.
pub const HALT_TOO_MANY_FAILURES: &str = "too many consecutive failures";

/// Halt reason recorded when the caller cancels between items.
pub const HALT_CANCELLED: &str = "cancelled";

/// Result of attempting one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The action succeeded.
    Success,

    /// The action was attempted and rejected, with the reason tag.
    Failed(String),

    /// The item was never attempted (filtered out before the run).
    Skipped(String),
}

impl Outcome {
    /// Whether this outcome counts towards the consecutive-failure valve.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Whether the action succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
        }
    }
}

/// Per-item result; created once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// The item the action was attempted on.
    pub item: String,

    /// What happened.
    pub outcome: Outcome,
}

impl ActionResult {
    /// Creates a result for an item filtered out before the run.
    #[must_use]
    pub fn skipped(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            outcome: Outcome::Skipped(reason.into()),
        }
    }
}

/// Completed (or early-halted) batch run.
///
/// `results` is always an in-order prefix of `items`: the loop is
/// strictly sequential and never reorders. `halted_early` is true
/// exactly when unattempted items remain.
#[derive(Debug, Clone)]
pub struct BatchRun {
    /// Items the run was asked to process, in input order.
    pub items: Vec<String>,

    /// One result per attempted item, matching the `items` prefix.
    pub results: Vec<ActionResult>,

    /// Whether the run stopped before attempting every item.
    pub halted_early: bool,

    /// Why the run stopped early, when it did.
    pub halt_reason: Option<String>,
}

impl BatchRun {
    /// Number of successful items.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_success()).count()
    }

    /// Number of failed items.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_failed()).count()
    }
}

/// Progress event emitted after each appended result.
///
/// Lets a caller drive logging or a progress bar without the executor
/// knowing anything about presentation.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// Zero-based index of the item within the run.
    pub index: usize,

    /// Total number of items in the run.
    pub total: usize,

    /// The item that was attempted.
    pub item: String,

    /// Its outcome.
    pub outcome: Outcome,
}

/// Cooperative cancellation flag, checked between items.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; takes effect before the next attempt.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Sequential executor for rate-limited batch actions.
///
/// Holds no cross-run state; one instance may drive any number of
/// independent runs.
#[derive(Debug)]
pub struct BatchExecutor {
    /// Wait policy between attempts.
    policy: DelayPolicy,

    /// Consecutive-failure valve threshold.
    consecutive_failure_limit: usize,

    /// Caller-side cancellation flag.
    cancel: CancelToken,

    /// Optional per-item progress sink.
    progress: Option<mpsc::UnboundedSender<BatchProgress>>,
}

impl BatchExecutor {
    /// Creates an executor with the given delay policy.
    #[must_use]
    pub fn new(policy: DelayPolicy) -> Self {
        Self {
            policy,
            consecutive_failure_limit: DEFAULT_CONSECUTIVE_FAILURE_LIMIT,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Overrides the consecutive-failure valve threshold.
    #[must_use]
    pub const fn with_consecutive_failure_limit(mut self, limit: usize) -> Self {
        self.consecutive_failure_limit = limit;
        self
    }

    /// Attaches a cancellation token checked between items.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attaches a progress sink receiving one event per appended result.
    #[must_use]
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<BatchProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Runs the batch: one attempt per item, in order, with policy
    /// waits between attempts.
    ///
    /// Failures are classified and recorded rather than propagated;
    /// only fatal transport errors, the consecutive-failure valve and
    /// cancellation stop the loop early.
    pub async fn run<F, Fut>(&self, items: Vec<String>, mut attempt: F) -> BatchRun
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<(), ActionError>>,
    {
        let total = items.len();
        let mut run = BatchRun {
            results: Vec::with_capacity(total),
            items,
            halted_early: false,
            halt_reason: None,
        };

        for index in 0..total {
            if self.cancel.is_cancelled() {
                warn!("Batch cancelled after {} of {} items", index, total);
                run.halted_early = true;
                run.halt_reason = Some(HALT_CANCELLED.to_owned());
                break;
            }

            let item = run.items[index].clone();
            let remaining = index + 1 < total;

            // Cooldown replaces the jitter delay for this gap when set.
            let mut cooldown: Option<Duration> = None;

            match attempt(item.clone()).await {
                Ok(()) => {
                    self.record(&mut run, index, total, &item, Outcome::Success);
                }
                Err(err) => match classify(&err) {
                    Classification::RateLimited { wait_secs } => {
                        self.record(
                            &mut run,
                            index,
                            total,
                            &item,
                            Outcome::Failed("rate_limited".to_owned()),
                        );
                        let wait = self.policy.cooldown(wait_secs);
                        warn!(
                            "Rate limited on '{}', cooling down for {:?}",
                            item, wait
                        );
                        cooldown = Some(wait);
                    }
                    Classification::Rejected { reason } => {
                        debug!("Item '{}' rejected: {}", item, reason);
                        self.record(&mut run, index, total, &item, Outcome::Failed(reason));
                    }
                    Classification::Fatal { reason } => {
                        self.record(
                            &mut run,
                            index,
                            total,
                            &item,
                            Outcome::Failed(reason.clone()),
                        );
                        if remaining {
                            warn!("Fatal transport error, halting batch: {}", reason);
                            run.halted_early = true;
                            run.halt_reason = Some(reason);
                        }
                        break;
                    }
                },
            }

            if self.trailing_failures(&run) >= self.consecutive_failure_limit {
                if remaining {
                    warn!(
                        "{} consecutive failures, halting batch",
                        self.consecutive_failure_limit
                    );
                    run.halted_early = true;
                    run.halt_reason = Some(HALT_TOO_MANY_FAILURES.to_owned());
                }
                break;
            }

            if remaining {
                let wait = cooldown.unwrap_or_else(|| self.policy.next_delay());
                tokio::time::sleep(wait).await;
            }
        }

        run
    }

    /// Appends a result and notifies the progress sink.
    fn record(
        &self,
        run: &mut BatchRun,
        index: usize,
        total: usize,
        item: &str,
        outcome: Outcome,
    ) {
        debug!("[{}/{}] {} -> {}", index + 1, total, item, outcome);

        if let Some(tx) = &self.progress {
            // A dropped receiver just means nobody is watching.
            let _ = tx.send(BatchProgress {
                index,
                total,
                item: item.to_owned(),
                outcome: outcome.clone(),
            });
        }

        run.results.push(ActionResult {
            item: item.to_owned(),
            outcome,
        });
    }

    /// Counts the failed results at the tail of the run.
    fn trailing_failures(&self, run: &BatchRun) -> usize {
        run.results
            .iter()
            .rev()
            .take_while(|r| r.outcome.is_failed())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn executor() -> BatchExecutor {
        // Keep the inter-item delay deterministic for the tests.
        BatchExecutor::new(DelayPolicy::from_millis(10, 0))
    }

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_ok_completes_run() {
        let run = executor()
            .run(items(&["a", "b", "c"]), |_item| async { Ok(()) })
            .await;

        assert_eq!(run.results.len(), 3);
        assert_eq!(run.succeeded(), 3);
        assert!(!run.halted_early);
        assert!(run.halt_reason.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_are_ordered_prefix_of_items() {
        let run = executor()
            .run(items(&["a", "b", "c"]), |_item| async { Ok(()) })
            .await;

        let attempted: Vec<_> = run.results.iter().map(|r| r.item.clone()).collect();
        assert_eq!(attempted, run.items);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_failures_halt_run() {
        let run = executor()
            .run(items(&["a", "b", "c", "d", "e", "f"]), |_item| async {
                Err(ActionError::new("USER_PRIVACY_RESTRICTED"))
            })
            .await;

        assert_eq!(run.results.len(), 5);
        assert!(run.halted_early);
        assert_eq!(run.halt_reason.as_deref(), Some(HALT_TOO_MANY_FAILURES));
        assert!(run.results.len() < run.items.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_valve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        let run = executor()
            .run(items(&["a", "b", "c", "d", "e", "f", "g", "h"]), move |_| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    // Every third attempt succeeds; never 5 failures in a row.
                    if n % 3 == 2 {
                        Ok(())
                    } else {
                        Err(ActionError::new("PEER_FLOOD"))
                    }
                }
            })
            .await;

        assert_eq!(run.results.len(), 8);
        assert!(!run.halted_early);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_halts_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        let run = executor()
            .run(items(&["a", "b", "c", "d", "e"]), move |_| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 1 {
                        Err(ActionError::new("AUTH_KEY_UNREGISTERED"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(run.results.len(), 2);
        assert!(run.halted_early);
        assert_eq!(run.halt_reason.as_deref(), Some("AUTH_KEY_UNREGISTERED"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_cooldown_before_next_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        let started = tokio::time::Instant::now();
        let run = executor()
            .run(items(&["a", "b", "c", "d", "e"]), move |_| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 2 {
                        Err(ActionError::new("FLOOD_WAIT_30"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(run.results.len(), 5);
        assert!(!run.halted_early);
        assert_eq!(run.succeeded(), 4);
        assert_eq!(
            run.results[2].outcome,
            Outcome::Failed("rate_limited".to_owned())
        );
        // All five items attempted; the gap after item 3 was >= 30s.
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hintless_rate_limit_uses_fallback() {
        let policy = DelayPolicy::from_millis(0, 0)
            .with_rate_limit_fallback(Duration::from_secs(7));
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        let started = tokio::time::Instant::now();
        let run = BatchExecutor::new(policy)
            .run(items(&["a", "b"]), move |_| {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ActionError::new("flood wait required"))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert_eq!(run.results.len(), 2);
        assert!(started.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start_keeps_no_results() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let run = executor()
            .with_cancel_token(cancel)
            .run(items(&["a", "b"]), |_item| async { Ok(()) })
            .await;

        assert!(run.results.is_empty());
        assert!(run.halted_early);
        assert_eq!(run.halt_reason.as_deref(), Some(HALT_CANCELLED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_run_preserves_results() {
        let cancel = CancelToken::new();
        let inner = cancel.clone();

        let run = executor()
            .with_cancel_token(cancel)
            .run(items(&["a", "b", "c"]), move |_item| {
                // Cancel from inside the first attempt; checked before item 2.
                inner.cancel();
                async { Ok(()) }
            })
            .await;

        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].outcome, Outcome::Success);
        assert!(run.halted_early);
        assert_eq!(run.halt_reason.as_deref(), Some(HALT_CANCELLED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_on_final_item_is_a_complete_run() {
        let run = executor()
            .run(items(&["only"]), |_item| async {
                Err(ActionError::new("SESSION_REVOKED"))
            })
            .await;

        // Nothing was left unattempted, so the run is complete.
        assert_eq!(run.results.len(), 1);
        assert!(!run.halted_early);
        assert_eq!(
            run.results[0].outcome,
            Outcome::Failed("SESSION_REVOKED".to_owned())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events_match_results() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let run = executor()
            .with_progress(tx)
            .run(items(&["a", "b"]), |_item| async { Ok(()) })
            .await;

        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }

        assert_eq!(events.len(), run.results.len());
        assert_eq!(events[0].index, 0);
        assert_eq!(events[0].total, 2);
        assert_eq!(events[1].item, "b");
        assert!(events[1].outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_items_is_a_noop() {
        let run = executor().run(Vec::new(), |_item| async { Ok(()) }).await;

        assert!(run.results.is_empty());
        assert!(!run.halted_early);
    }
}
