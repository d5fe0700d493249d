//! Batch orchestrator - drives a run's items through the item operation.
//!
//! The orchestrator owns the BatchRun state machine:
//!
//! ```text
//! preparing --submit(valid)--> preparing (items loaded) --start--> processing --> completed
//!     ^            |
//!     +--invalid---+  (errors exposed, nothing processed)
//! ```
//!
//! Items are processed one at a time, in input order. Every mutation is
//! published as a whole snapshot on a watch channel; subscribers only read.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::domain::{BatchPhase, BatchRun};
use crate::error::{BulkError, Result};
use crate::executor::{ItemOperation, StepExecutor};
use crate::progress::{ProgressReport, ProgressReporter};
use crate::retry::RetryPolicy;
use crate::validation::{AcceptAll, RecordValidator, validate_batch};

use super::run_config::RunConfig;

/// Result of a start request.
#[derive(Debug)]
pub enum StartOutcome<P> {
    /// This call drove the run to completion; final snapshot attached
    Completed(BatchRun<P>),
    /// The run was already started by an earlier call; nothing was done
    AlreadyStarted,
}

/// What a start request found under the state lock
enum StartTransition {
    Started,
    AlreadyStarted,
    NotReady,
}

fn submit_after_start() -> BulkError {
    BulkError::InvalidState("items cannot be submitted once processing has started".to_string())
}

impl<P> StartOutcome<P> {
    pub fn is_already_started(&self) -> bool {
        matches!(self, StartOutcome::AlreadyStarted)
    }

    /// The final snapshot, if this call produced one
    pub fn into_run(self) -> Option<BatchRun<P>> {
        match self {
            StartOutcome::Completed(run) => Some(run),
            StartOutcome::AlreadyStarted => None,
        }
    }
}

/// Sequential bulk processor for one batch run.
///
/// For each item:
/// 1. Marks it running and records the start time
/// 2. Runs one attempt under the per-item timeout
/// 3. On success: marks it succeeded
/// 4. On failure: asks the retry policy; retries after backoff or marks it failed
/// 5. Stops before the next item if cancellation was requested
/// 6. Pauses for the inter-item delay
pub struct BatchOrchestrator<P, O>
where
    P: Send + Sync + 'static,
    O: ItemOperation<P>,
{
    operation: Arc<O>,
    validator: Arc<dyn RecordValidator<P>>,
    executor: StepExecutor,
    retry: RetryPolicy,
    config: RunConfig,
    state: watch::Sender<BatchRun<P>>,
    cancel: CancellationToken,
}

impl<P, O> BatchOrchestrator<P, O>
where
    P: Send + Sync + 'static,
    O: ItemOperation<P>,
{
    /// Create an orchestrator that accepts any record.
    pub fn new(operation: O, config: RunConfig) -> Self {
        let (state, _) = watch::channel(BatchRun::new());
        Self {
            operation: Arc::new(operation),
            validator: Arc::new(AcceptAll),
            executor: StepExecutor::new(config.per_item_timeout),
            retry: config.retry_policy(),
            config,
            state,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `validator` to check each record on submit.
    pub fn with_validator(mut self, validator: impl RecordValidator<P> + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Validate and load the items for this run.
    ///
    /// All validation problems are collected and returned together. On
    /// failure the run stays in `preparing` with no items loaded, and the
    /// errors are visible on the snapshot. Resubmitting replaces any
    /// previously accepted items.
    pub fn submit(&self, payloads: Vec<P>) -> Result<()> {
        self.submit_shared(payloads.into_iter().map(Arc::new).collect())
    }

    /// Like [`submit`](Self::submit) for payloads the caller already shares.
    pub fn submit_shared(&self, payloads: Vec<Arc<P>>) -> Result<()> {
        if self.state.borrow().phase != BatchPhase::Preparing {
            return Err(submit_after_start());
        }

        let errors = validate_batch(&payloads, self.validator.as_ref());
        let count = payloads.len();

        // The phase is checked again under the write lock: a start may have
        // won the race while the validator was running.
        let mut accepted = false;
        self.state.send_if_modified(|run| {
            if run.phase != BatchPhase::Preparing {
                return false;
            }
            accepted = true;
            if errors.is_empty() {
                run.load(payloads);
            } else {
                run.load(Vec::new());
                run.validation_errors = errors.clone();
            }
            true
        });

        if !accepted {
            return Err(submit_after_start());
        }
        if !errors.is_empty() {
            log::warn!("Rejected submission with {} validation error(s)", errors.len());
            for error in &errors {
                log::debug!("Validation: {}", error);
            }
            return Err(BulkError::Validation(errors));
        }

        log::info!("Accepted {} item(s) for processing", count);
        Ok(())
    }

    /// Process every loaded item, then return the final snapshot.
    ///
    /// Only the first call does any work. A call made while the run is
    /// processing, or after it completed, is a logged no-op returning
    /// [`StartOutcome::AlreadyStarted`].
    pub async fn start(&self) -> Result<StartOutcome<P>> {
        // Readiness check and the move to `processing` happen under one write
        // lock, so a concurrent submit or start sees either side of it.
        let mut transition = StartTransition::NotReady;
        self.state.send_if_modified(|run| {
            if run.phase != BatchPhase::Preparing {
                transition = StartTransition::AlreadyStarted;
                return false;
            }
            if run.total() == 0 || !run.validation_errors.is_empty() {
                return false;
            }
            run.phase = BatchPhase::Processing;
            run.cursor = 0;
            run.started_at = Some(Utc::now());
            transition = StartTransition::Started;
            true
        });

        match transition {
            StartTransition::Started => Ok(StartOutcome::Completed(self.process_all().await)),
            StartTransition::AlreadyStarted => {
                log::warn!("Start requested but the run was already started; ignoring");
                Ok(StartOutcome::AlreadyStarted)
            }
            StartTransition::NotReady => Err(BulkError::InvalidState("no validated items to process".to_string())),
        }
    }

    /// Submit `payloads` and process them in one call.
    pub async fn run(&self, payloads: Vec<P>) -> Result<BatchRun<P>> {
        self.submit(payloads)?;
        self.start().await?.into_run().ok_or_else(|| {
            BulkError::InvalidState("run was started concurrently by another caller".to_string())
        })
    }

    /// Request cancellation. Idempotent.
    ///
    /// The item in flight is allowed to finish its current attempt; no
    /// further item is started and pending retries are abandoned.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            log::info!("Cancellation requested");
        }
        self.cancel.cancel();
        self.state.send_if_modified(|run| {
            if run.cancel_requested {
                false
            } else {
                run.cancel_requested = true;
                true
            }
        });
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Subscribe to live snapshots of this run
    pub fn subscribe(&self) -> ProgressReporter<P> {
        ProgressReporter::new(self.state.subscribe(), self.config.default_item_estimate)
    }

    /// Current state of the run
    pub fn snapshot(&self) -> BatchRun<P> {
        self.state.borrow().clone()
    }

    /// Progress report for the current state
    pub fn progress(&self) -> ProgressReport {
        ProgressReport::from_run(&self.state.borrow(), self.config.default_item_estimate)
    }

    fn update(&self, f: impl FnOnce(&mut BatchRun<P>)) {
        self.state.send_modify(f);
    }

    async fn process_all(&self) -> BatchRun<P> {
        let total = self.state.borrow().total();
        log::info!(
            "Processing {} item(s); {:?} per attempt, up to {} attempt(s) each, worst-case backoff {:?} per item",
            total,
            self.executor.timeout(),
            self.retry.max_attempts(),
            self.retry.worst_case_backoff()
        );

        for index in 0..total {
            if self.cancel.is_cancelled() {
                log::info!("Stopping before item {}/{}: cancelled", index + 1, total);
                break;
            }

            self.update(|run| run.cursor = index);
            self.process_item(index, total).await;

            if index + 1 < total && !self.pause(self.config.inter_item_delay).await {
                log::info!("Stopping after item {}/{}: cancelled", index + 1, total);
                break;
            }
        }

        self.update(|run| {
            run.phase = BatchPhase::Completed;
            run.cursor = run.items.len();
            run.finished_at = Some(Utc::now());
        });

        let run = self.snapshot();
        log::info!(
            "Batch completed: {} succeeded, {} failed, {} not finished",
            run.succeeded_count(),
            run.failed_count(),
            run.remaining_count()
        );
        run
    }

    /// Drive one item to a terminal state. Bounded by the retry policy.
    async fn process_item(&self, index: usize, total: usize) {
        let payload = Arc::clone(&self.state.borrow().items[index].payload);
        self.update(|run| run.items[index].mark_running(Utc::now()));
        log::info!("[item {}/{}] started", index + 1, total);

        loop {
            let error = match self.executor.execute(self.operation.as_ref(), Arc::clone(&payload)).await {
                Ok(()) => {
                    self.update(|run| run.items[index].mark_succeeded(Utc::now()));
                    log::info!("[item {}/{}] succeeded", index + 1, total);
                    return;
                }
                Err(e) => e,
            };

            let attempt_count = self.state.borrow().items[index].attempt_count;
            let decision = self.retry.should_retry(attempt_count, &error);

            if !decision.retry {
                log::warn!(
                    "[item {}/{}] failed after {} retr{}: {}",
                    index + 1,
                    total,
                    attempt_count,
                    if attempt_count == 1 { "y" } else { "ies" },
                    error
                );
                self.update(|run| run.items[index].mark_failed(error.to_string(), Utc::now()));
                return;
            }

            log::warn!(
                "[item {}/{}] attempt failed ({}); retry {}/{} in {:?}",
                index + 1,
                total,
                error,
                attempt_count + 1,
                self.retry.max_retries,
                decision.delay
            );
            self.update(|run| run.items[index].mark_retrying(error.to_string()));

            if !self.pause(decision.delay).await {
                log::info!("[item {}/{}] retry abandoned: cancelled", index + 1, total);
                self.update(|run| {
                    run.items[index].mark_failed(format!("Cancelled before retry: {}", error), Utc::now())
                });
                return;
            }

            self.update(|run| run.items[index].record_retry());
        }
    }

    /// Sleep for `delay` unless cancelled first. Returns false if cancelled.
    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
