//! Error types for bulkrun
//!
//! Centralized error handling using thiserror. Per-item failures never surface
//! here; they are captured on the work item. These errors cover the batch level.

use thiserror::Error;

/// All batch-level errors that can occur in bulkrun
#[derive(Debug, Error)]
pub enum BulkError {
    /// Submitted input failed validation; every problem found is listed
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Operation not allowed in the current batch phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BulkError {
    /// Validation errors carried by this error, if any
    pub fn validation_errors(&self) -> Option<&[String]> {
        match self {
            BulkError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Result type alias for bulkrun operations
pub type Result<T> = std::result::Result<T, BulkError>;
