//! Step executor module - runs one item operation attempt.
//!
//! This module provides:
//! - ItemOperation: the caller-supplied per-item side effect
//! - PhasedOperation: named phases chained into one operation
//! - CommandOperation: a shell command run per item
//! - StepExecutor / execute: timeout and panic boundary around one attempt

pub mod command;
mod operation;
mod step;

pub use command::{CommandOperation, ITEM_ENV};
pub use operation::{FnOperation, ItemOperation, OperationError, PhasedOperation, operation_fn};
pub use step::{ExecutionError, StepExecutor, execute};
