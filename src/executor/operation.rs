//! Item operation contract.
//!
//! The per-item side effect (generate an artifact, call an activation endpoint,
//! commit a record) is opaque to the engine. Callers implement `ItemOperation`
//! directly, wrap a closure with [`operation_fn`], or chain named phases with
//! [`PhasedOperation`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a caller-supplied operation.
///
/// The caller classifies each failure: transient failures may be retried,
/// terminal failures end the item immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// Worth another attempt (network blip, collaborator busy)
    #[error("{0}")]
    Transient(String),

    /// Retrying cannot help (malformed payload, record rejected)
    #[error("{0}")]
    Terminal(String),
}

impl OperationError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Terminal(m) => m,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    /// Same classification, message prefixed with `context`
    pub fn with_context(self, context: &str) -> Self {
        match self {
            Self::Transient(m) => Self::Transient(format!("{}: {}", context, m)),
            Self::Terminal(m) => Self::Terminal(format!("{}: {}", context, m)),
        }
    }
}

/// The side-effecting work performed for one payload.
#[async_trait]
pub trait ItemOperation<P>: Send + Sync
where
    P: Send + Sync + 'static,
{
    /// Perform the operation for `payload`. May be called again for the same
    /// payload when a previous attempt failed transiently or timed out.
    async fn execute(&self, payload: Arc<P>) -> Result<(), OperationError>;
}

#[async_trait]
impl<P, O> ItemOperation<P> for Arc<O>
where
    P: Send + Sync + 'static,
    O: ItemOperation<P> + ?Sized,
{
    async fn execute(&self, payload: Arc<P>) -> Result<(), OperationError> {
        (**self).execute(payload).await
    }
}

/// Adapter turning an async closure into an [`ItemOperation`].
pub struct FnOperation<F> {
    f: F,
}

/// Wrap an async closure as an operation.
pub fn operation_fn<F>(f: F) -> FnOperation<F> {
    FnOperation { f }
}

#[async_trait]
impl<P, F, Fut> ItemOperation<P> for FnOperation<F>
where
    P: Send + Sync + 'static,
    F: Fn(Arc<P>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), OperationError>> + Send + 'static,
{
    async fn execute(&self, payload: Arc<P>) -> Result<(), OperationError> {
        (self.f)(payload).await
    }
}

/// An operation made of named phases run in order, e.g.
/// `generate` -> `upload` -> `commit`.
///
/// The first failing phase stops the chain. Its error keeps its
/// classification and is prefixed with the phase name.
pub struct PhasedOperation<P: Send + Sync + 'static> {
    phases: Vec<(String, Box<dyn ItemOperation<P>>)>,
}

impl<P> PhasedOperation<P>
where
    P: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self { phases: Vec::new() }
    }

    /// Append a phase
    pub fn phase(mut self, name: impl Into<String>, operation: impl ItemOperation<P> + 'static) -> Self {
        self.phases.push((name.into(), Box::new(operation)));
        self
    }
}

impl<P> Default for PhasedOperation<P>
where
    P: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P> ItemOperation<P> for PhasedOperation<P>
where
    P: Send + Sync + 'static,
{
    async fn execute(&self, payload: Arc<P>) -> Result<(), OperationError> {
        let count = self.phases.len();
        for (position, (name, operation)) in self.phases.iter().enumerate() {
            log::debug!("Running phase '{}' ({}/{})", name, position + 1, count);
            operation
                .execute(Arc::clone(&payload))
                .await
                .map_err(|e| e.with_context(name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the phases it saw, in order.
    struct RecordingPhase {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail_with: Option<OperationError>,
    }

    #[async_trait]
    impl ItemOperation<String> for RecordingPhase {
        async fn execute(&self, _payload: Arc<String>) -> Result<(), OperationError> {
            self.log.lock().unwrap().push(self.name);
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    fn phase(
        name: &'static str,
        log: &Arc<Mutex<Vec<&'static str>>>,
        fail_with: Option<OperationError>,
    ) -> RecordingPhase {
        RecordingPhase {
            name,
            log: Arc::clone(log),
            fail_with,
        }
    }

    #[test]
    fn test_operation_error_helpers() {
        let err = OperationError::transient("connection reset");
        assert!(!err.is_terminal());
        assert_eq!(err.message(), "connection reset");
        assert_eq!(err.to_string(), "connection reset");

        let err = OperationError::terminal("missing barcode").with_context("generate");
        assert!(err.is_terminal());
        assert_eq!(err.message(), "generate: missing barcode");
    }

    #[tokio::test]
    async fn test_operation_fn_wraps_closure() {
        let op = operation_fn(|payload: Arc<String>| async move {
            if payload.is_empty() {
                Err(OperationError::terminal("empty payload"))
            } else {
                Ok(())
            }
        });

        assert!(op.execute(Arc::new("sku-1".to_string())).await.is_ok());
        let err = op.execute(Arc::new(String::new())).await.unwrap_err();
        assert_eq!(err, OperationError::terminal("empty payload"));
    }

    #[tokio::test]
    async fn test_phased_operation_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let op = PhasedOperation::<String>::new()
            .phase("generate", phase("generate", &log, None))
            .phase("upload", phase("upload", &log, None))
            .phase("commit", phase("commit", &log, None));

        op.execute(Arc::new("item".to_string())).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["generate", "upload", "commit"]);
    }

    #[tokio::test]
    async fn test_phased_operation_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let op = PhasedOperation::<String>::new()
            .phase("generate", phase("generate", &log, None))
            .phase("upload", phase("upload", &log, Some(OperationError::transient("503 from store"))))
            .phase("commit", phase("commit", &log, None));

        let err = op.execute(Arc::new("item".to_string())).await.unwrap_err();
        assert_eq!(err, OperationError::transient("upload: 503 from store"));
        assert_eq!(*log.lock().unwrap(), vec!["generate", "upload"]);
    }

    #[tokio::test]
    async fn test_empty_phased_operation_succeeds() {
        let op: PhasedOperation<String> = PhasedOperation::default();
        assert!(op.execute(Arc::new("item".to_string())).await.is_ok());
    }

    #[tokio::test]
    async fn test_arc_operation_delegates() {
        let op = Arc::new(operation_fn(|_p: Arc<String>| async { Err::<(), _>(OperationError::terminal("nope")) }));
        let err = op.execute(Arc::new("x".to_string())).await.unwrap_err();
        assert!(err.is_terminal());
    }
}
