//! Domain types for bulkrun
//!
//! This module contains the core state records:
//! - WorkItem: one unit of work and its processing status
//! - BatchRun: an ordered collection of WorkItems plus the run's phase

pub mod batch_run;
pub mod work_item;

pub use batch_run::{BatchPhase, BatchRun};
pub use work_item::{ItemStatus, WorkItem};
