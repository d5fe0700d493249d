//! Progress reporting over a batch run.
//!
//! Everything here is computed from the per-item statuses at query time. No
//! counter is maintained alongside the items, so a report cannot drift from
//! the state it describes. Out-of-range arithmetic means a cursor or status
//! invariant was broken: the value is clamped and a warning is emitted.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;

use crate::domain::{BatchPhase, BatchRun};

/// Per-item estimate used before any item has finished
pub const DEFAULT_ITEM_ESTIMATE: Duration = Duration::from_millis(2500);

/// Point-in-time view of a run's progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub phase: BatchPhase,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items not yet terminal, including the one in flight
    pub remaining: usize,
    /// Index of the item being processed, if any
    pub current_index: Option<usize>,
    /// In [0, 100]
    pub percent_complete: f64,
    pub eta: Duration,
    pub cancel_requested: bool,
}

impl ProgressReport {
    /// Compute a report for `run`. `default_estimate` stands in for the
    /// average item duration until real samples exist.
    pub fn from_run<P>(run: &BatchRun<P>, default_estimate: Duration) -> Self {
        let total = run.total();
        let succeeded = run.succeeded_count();
        let failed = run.failed_count();
        let done = succeeded + failed;

        let active = run.active_count();
        if active > 1 {
            tracing::warn!(active, total, "Progress corruption: more than one item in flight");
        }

        let remaining = match total.checked_sub(done) {
            Some(remaining) => remaining,
            None => {
                tracing::warn!(total, done, "Progress corruption: more finished items than total");
                0
            }
        };

        let percent_complete = percent(done, total);
        let eta = estimate_remaining(run, remaining, default_estimate);

        Self {
            phase: run.phase,
            total,
            succeeded,
            failed,
            remaining,
            current_index: run.current_item().filter(|item| item.is_active()).map(|item| item.index),
            percent_complete,
            eta,
            cancel_requested: run.cancel_requested,
        }
    }

    /// Number of items in a terminal state
    pub fn finished(&self) -> usize {
        self.succeeded + self.failed
    }
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = done as f64 / total as f64 * 100.0;
    if !(0.0..=100.0).contains(&raw) {
        tracing::warn!(done, total, raw, "Progress corruption: percent out of range, clamping");
    }
    raw.clamp(0.0, 100.0)
}

/// Average duration of finished items, if any have finished
fn average_item_duration<P>(run: &BatchRun<P>) -> Option<Duration> {
    let samples: Vec<Duration> = run.items.iter().filter_map(|item| item.elapsed()).collect();
    if samples.is_empty() {
        return None;
    }
    let sum: Duration = samples.iter().sum();
    Some(sum / samples.len() as u32)
}

fn estimate_remaining<P>(run: &BatchRun<P>, remaining: usize, default_estimate: Duration) -> Duration {
    if run.phase.is_terminal() {
        return Duration::ZERO;
    }
    let per_item = average_item_duration(run).unwrap_or(default_estimate);
    per_item.saturating_mul(u32::try_from(remaining).unwrap_or(u32::MAX))
}

impl fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}/{} done ({:.1}%) - {} ok, {} failed, {} remaining",
            self.phase,
            self.finished(),
            self.total,
            self.percent_complete,
            self.succeeded,
            self.failed,
            self.remaining
        )?;
        if !self.phase.is_terminal() {
            write!(f, ", eta {}s", self.eta.as_secs())?;
        }
        if self.cancel_requested {
            write!(f, " (cancelling)")?;
        }
        Ok(())
    }
}

/// Read-only subscriber to a run's live snapshots.
///
/// Snapshots are published whole, once per mutation, so a reader never sees
/// a half-applied update. Readers may skip intermediate snapshots.
pub struct ProgressReporter<P> {
    rx: watch::Receiver<BatchRun<P>>,
    default_estimate: Duration,
    last_percent: f64,
}

impl<P> ProgressReporter<P> {
    pub fn new(rx: watch::Receiver<BatchRun<P>>, default_estimate: Duration) -> Self {
        Self {
            rx,
            default_estimate,
            last_percent: 0.0,
        }
    }

    /// Report for the latest published snapshot
    pub fn current(&self) -> ProgressReport {
        ProgressReport::from_run(&self.rx.borrow(), self.default_estimate)
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> BatchRun<P> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published snapshot. Returns None once the
    /// orchestrator is gone and no further updates can arrive.
    pub async fn changed(&mut self) -> Option<ProgressReport> {
        self.rx.changed().await.ok()?;
        let report = ProgressReport::from_run(&self.rx.borrow_and_update(), self.default_estimate);
        if report.percent_complete < self.last_percent {
            tracing::warn!(
                previous = self.last_percent,
                current = report.percent_complete,
                "Progress corruption: percent complete went backwards"
            );
        }
        self.last_percent = self.last_percent.max(report.percent_complete);
        Some(report)
    }

    /// Wait until the run reaches `completed` and return that snapshot
    pub async fn wait_for_completion(&mut self) -> BatchRun<P> {
        if let Ok(run) = self.rx.wait_for(|run| run.is_completed()).await {
            return run.clone();
        }
        self.rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn run_with(n: usize) -> BatchRun<u32> {
        let mut run = BatchRun::new();
        run.load((0..n as u32).map(Arc::new).collect());
        run.phase = BatchPhase::Processing;
        run
    }

    fn finish(run: &mut BatchRun<u32>, index: usize, ok: bool, millis: i64) {
        let start = Utc::now();
        let end = start + chrono::Duration::milliseconds(millis);
        run.items[index].mark_running(start);
        if ok {
            run.items[index].mark_succeeded(end);
        } else {
            run.items[index].mark_failed("boom", end);
        }
    }

    #[test]
    fn test_empty_run_reports_zero() {
        let run: BatchRun<u32> = BatchRun::new();
        let report = ProgressReport::from_run(&run, DEFAULT_ITEM_ESTIMATE);
        assert_eq!(report.total, 0);
        assert_eq!(report.percent_complete, 0.0);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.eta, Duration::ZERO);
    }

    #[test]
    fn test_default_estimate_before_samples() {
        let run = run_with(4);
        let report = ProgressReport::from_run(&run, DEFAULT_ITEM_ESTIMATE);
        assert_eq!(report.remaining, 4);
        assert_eq!(report.eta, Duration::from_secs(10));
    }

    #[test]
    fn test_percent_counts_failed_as_done() {
        let mut run = run_with(4);
        finish(&mut run, 0, true, 1000);
        finish(&mut run, 1, false, 3000);

        let report = ProgressReport::from_run(&run, DEFAULT_ITEM_ESTIMATE);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.finished(), 2);
        assert_eq!(report.percent_complete, 50.0);
        // average of 1s and 3s, times 2 remaining
        assert_eq!(report.eta, Duration::from_secs(4));
    }

    #[test]
    fn test_current_index_only_when_active() {
        let mut run = run_with(3);
        run.cursor = 1;
        assert_eq!(ProgressReport::from_run(&run, DEFAULT_ITEM_ESTIMATE).current_index, None);

        run.items[1].mark_running(Utc::now());
        assert_eq!(ProgressReport::from_run(&run, DEFAULT_ITEM_ESTIMATE).current_index, Some(1));
    }

    #[test]
    fn test_completed_run_has_no_eta() {
        let mut run = run_with(2);
        finish(&mut run, 0, true, 10);
        run.phase = BatchPhase::Completed;
        run.cancel_requested = true;

        let report = ProgressReport::from_run(&run, DEFAULT_ITEM_ESTIMATE);
        assert_eq!(report.eta, Duration::ZERO);
        assert_eq!(report.remaining, 1);
        assert_eq!(report.to_string(), "[completed] 1/2 done (50.0%) - 1 ok, 0 failed, 1 remaining (cancelling)");
    }

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(percent(3, 2), 100.0);
        assert_eq!(percent(0, 5), 0.0);
        assert_eq!(percent(5, 5), 100.0);
    }

    #[test]
    fn test_display_while_processing() {
        let run = run_with(2);
        let report = ProgressReport::from_run(&run, Duration::from_secs(3));
        assert_eq!(report.to_string(), "[processing] 0/2 done (0.0%) - 0 ok, 0 failed, 2 remaining, eta 6s");
    }

    #[tokio::test]
    async fn test_reporter_follows_published_snapshots() {
        let (tx, rx) = watch::channel(run_with(2));
        let mut reporter = ProgressReporter::new(rx, DEFAULT_ITEM_ESTIMATE);
        assert_eq!(reporter.current().percent_complete, 0.0);

        tx.send_modify(|run| finish(run, 0, true, 5));
        let report = reporter.changed().await.unwrap();
        assert_eq!(report.percent_complete, 50.0);

        tx.send_modify(|run| {
            finish(run, 1, true, 5);
            run.phase = BatchPhase::Completed;
        });
        let final_run = reporter.wait_for_completion().await;
        assert_eq!(final_run.succeeded_count(), 2);

        drop(tx);
        assert!(reporter.changed().await.is_none());
    }
}
