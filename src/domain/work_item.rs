//! Work item record and its processing status
//!
//! A WorkItem is one unit of batch work: an opaque payload shared read-only
//! with the caller, plus the state the orchestrator mutates while driving it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Processing status of a single work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Not yet attempted
    Pending,
    /// First attempt in flight
    Running,
    /// A previous attempt failed and a retry is scheduled or in flight
    Retrying,
    /// Operation completed
    Succeeded,
    /// Gave up: terminal error or retries exhausted
    Failed,
}

impl ItemStatus {
    /// Returns true if the item will not be processed again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Failed)
    }

    /// Returns true if the item currently owns the worker
    pub fn is_active(&self) -> bool {
        matches!(self, ItemStatus::Running | ItemStatus::Retrying)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Running => "running",
            ItemStatus::Retrying => "retrying",
            ItemStatus::Succeeded => "succeeded",
            ItemStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of batch work
#[derive(Debug, Serialize)]
pub struct WorkItem<P> {
    /// Position in the submitted list (0-indexed)
    pub index: usize,

    /// Caller's record; the engine never mutates it
    pub payload: Arc<P>,

    pub status: ItemStatus,

    /// Number of retries performed (the first attempt is not counted)
    pub attempt_count: u32,

    /// Reason for the most recent failure; cleared on success
    pub last_error: Option<String>,

    //=== Timestamps (reporting only) ===
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl<P> Clone for WorkItem<P> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            payload: Arc::clone(&self.payload),
            status: self.status,
            attempt_count: self.attempt_count,
            last_error: self.last_error.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

impl<P> WorkItem<P> {
    /// Create a pending item for the given payload
    pub fn new(index: usize, payload: Arc<P>) -> Self {
        Self {
            index,
            payload,
            status: ItemStatus::Pending,
            attempt_count: 0,
            last_error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// True once processing has begun for this item
    pub fn was_attempted(&self) -> bool {
        self.started_at.is_some()
    }

    /// Wall-clock time spent on this item, once it has finished
    pub fn elapsed(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => (end - start).to_std().ok(),
            _ => None,
        }
    }

    /// Begin the first attempt. `started_at` is only ever set once.
    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        self.status = ItemStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Record a failed attempt that will be retried
    pub fn mark_retrying(&mut self, error: impl Into<String>) {
        self.status = ItemStatus::Retrying;
        self.last_error = Some(error.into());
    }

    /// Count a retry about to be attempted
    pub fn record_retry(&mut self) {
        self.attempt_count += 1;
    }

    pub fn mark_succeeded(&mut self, now: DateTime<Utc>) {
        self.status = ItemStatus::Succeeded;
        self.last_error = None;
        if self.finished_at.is_none() {
            self.finished_at = Some(now);
        }
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = ItemStatus::Failed;
        self.last_error = Some(error.into());
        if self.finished_at.is_none() {
            self.finished_at = Some(now);
        }
    }
}
