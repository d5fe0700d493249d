//! Step executor - runs one attempt of an item operation under a deadline.
//!
//! Exactly one outcome is produced per call. A hung operation resolves through
//! the timeout path; a panicking operation is reported as a transient failure.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;

use super::operation::{ItemOperation, OperationError};

/// Why a single attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The operation did not finish within the per-item deadline
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Retryable failure
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Non-retryable failure
    #[error("Terminal failure: {0}")]
    Terminal(String),
}

impl ExecutionError {
    /// Timeouts and transient failures may be retried
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExecutionError::Terminal(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout(_))
    }
}

impl From<OperationError> for ExecutionError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::Transient(m) => ExecutionError::Transient(m),
            OperationError::Terminal(m) => ExecutionError::Terminal(m),
        }
    }
}

/// Run `operation` for `payload`, giving up after `timeout`.
///
/// On timeout the in-flight attempt is abandoned, not cancelled; any cleanup
/// of external side effects is the operation's own responsibility.
pub async fn execute<P, O>(operation: &O, payload: Arc<P>, timeout: Duration) -> Result<(), ExecutionError>
where
    P: Send + Sync + 'static,
    O: ItemOperation<P> + ?Sized,
{
    let attempt = AssertUnwindSafe(operation.execute(payload)).catch_unwind();

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(e))) => Err(e.into()),
        Ok(Err(panic)) => Err(ExecutionError::Transient(format!(
            "operation panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Err(_) => Err(ExecutionError::Timeout(timeout)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Step executor bound to a fixed per-item timeout
#[derive(Debug, Clone)]
pub struct StepExecutor {
    timeout: Duration,
}

impl StepExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one attempt of `operation` for `payload`
    pub async fn execute<P, O>(&self, operation: &O, payload: Arc<P>) -> Result<(), ExecutionError>
    where
        P: Send + Sync + 'static,
        O: ItemOperation<P> + ?Sized,
    {
        execute(operation, payload, self.timeout).await
    }
}
