//! Batch run record
//!
//! A BatchRun is one execution of the engine over an ordered item list. Counts
//! are always derived from the items; nothing here caches an aggregate.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::work_item::{ItemStatus, WorkItem};

/// Lifecycle phase of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPhase {
    /// Accepting and validating input; nothing has been processed
    Preparing,
    /// The item queue is being drained
    Processing,
    /// Queue drained or cancelled; terminal
    Completed,
}

impl BatchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchPhase::Completed)
    }
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatchPhase::Preparing => "preparing",
            BatchPhase::Processing => "processing",
            BatchPhase::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// One execution of the engine over an ordered list of payloads
#[derive(Debug, Serialize)]
pub struct BatchRun<P> {
    /// Items in input order; order determines processing sequence
    pub items: Vec<WorkItem<P>>,

    /// Index of the item being processed, or `items.len()` when idle/complete
    pub cursor: usize,

    pub phase: BatchPhase,

    /// Once set, stays set for the life of the run
    pub cancel_requested: bool,

    /// Errors from the latest validation pass (empty when input was accepted)
    pub validation_errors: Vec<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl<P> Clone for BatchRun<P> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            cursor: self.cursor,
            phase: self.phase,
            cancel_requested: self.cancel_requested,
            validation_errors: self.validation_errors.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

impl<P> Default for BatchRun<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> BatchRun<P> {
    /// Create an empty run waiting for input
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cursor: 0,
            phase: BatchPhase::Preparing,
            cancel_requested: false,
            validation_errors: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Replace the item list with fresh pending items built from `payloads`
    pub fn load(&mut self, payloads: Vec<Arc<P>>) {
        self.items = payloads
            .into_iter()
            .enumerate()
            .map(|(index, payload)| WorkItem::new(index, payload))
            .collect();
        self.cursor = self.items.len();
        self.validation_errors.clear();
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.count(ItemStatus::Succeeded)
    }

    pub fn failed_count(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    pub fn pending_count(&self) -> usize {
        self.count(ItemStatus::Pending)
    }

    /// Items currently running or retrying; never more than one
    pub fn active_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_active()).count()
    }

    /// Items not yet in a terminal state
    pub fn remaining_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_terminal()).count()
    }

    /// The item at the cursor, if the cursor is inside the list
    pub fn current_item(&self) -> Option<&WorkItem<P>> {
        self.items.get(self.cursor)
    }

    pub fn is_completed(&self) -> bool {
        self.phase.is_terminal()
    }

    /// True when the run completed without every item reaching a terminal state
    pub fn is_incomplete(&self) -> bool {
        self.is_completed() && self.remaining_count() > 0
    }

    /// Payloads of items that succeeded, in input order
    pub fn succeeded_payloads(&self) -> impl Iterator<Item = &Arc<P>> {
        self.items
            .iter()
            .filter(|item| item.status == ItemStatus::Succeeded)
            .map(|item| &item.payload)
    }

    /// Items that were never attempted (cancelled before they were reached)
    pub fn unattempted(&self) -> impl Iterator<Item = &WorkItem<P>> {
        self.items.iter().filter(|item| !item.was_attempted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(n: usize) -> BatchRun<u32> {
        let mut run = BatchRun::new();
        run.load((0..n as u32).map(Arc::new).collect());
        run
    }

    #[test]
    fn test_new_run_is_preparing() {
        let run: BatchRun<u32> = BatchRun::new();
        assert_eq!(run.phase, BatchPhase::Preparing);
        assert_eq!(run.total(), 0);
        assert!(!run.cancel_requested);
        assert!(run.current_item().is_none());
    }

    #[test]
    fn test_load_builds_pending_items_in_order() {
        let run = run_with(3);
        assert_eq!(run.total(), 3);
        assert_eq!(run.pending_count(), 3);
        assert_eq!(run.cursor, 3);
        for (i, item) in run.items.iter().enumerate() {
            assert_eq!(item.index, i);
            assert_eq!(*item.payload, i as u32);
        }
    }

    #[test]
    fn test_load_clears_validation_errors() {
        let mut run: BatchRun<u32> = BatchRun::new();
        run.validation_errors = vec!["No items provided".to_string()];
        run.load(vec![Arc::new(7)]);
        assert!(run.validation_errors.is_empty());
    }

    #[test]
    fn test_counts_are_derived() {
        let mut run = run_with(4);
        let now = Utc::now();
        run.items[0].mark_running(now);
        run.items[0].mark_succeeded(now);
        run.items[1].mark_running(now);
        run.items[1].mark_failed("boom", now);
        run.items[2].mark_running(now);

        assert_eq!(run.succeeded_count(), 1);
        assert_eq!(run.failed_count(), 1);
        assert_eq!(run.active_count(), 1);
        assert_eq!(run.pending_count(), 1);
        assert_eq!(run.remaining_count(), 2);
    }

    #[test]
    fn test_succeeded_payloads_and_unattempted() {
        let mut run = run_with(3);
        let now = Utc::now();
        run.items[0].mark_running(now);
        run.items[0].mark_succeeded(now);
        run.phase = BatchPhase::Completed;

        let ok: Vec<u32> = run.succeeded_payloads().map(|p| **p).collect();
        assert_eq!(ok, vec![0]);
        assert_eq!(run.unattempted().count(), 2);
        assert!(run.is_incomplete());
    }

    #[test]
    fn test_phase_display_and_terminal() {
        assert_eq!(BatchPhase::Processing.to_string(), "processing");
        assert!(BatchPhase::Completed.is_terminal());
        assert!(!BatchPhase::Preparing.is_terminal());
    }
}
