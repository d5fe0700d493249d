//! Batch runner module - drives a batch of work items to completion.
//!
//! This module provides the core processing logic:
//! - BatchOrchestrator for owning and advancing one batch run
//! - RunConfig for the engine's timing and retry settings
//! - StartOutcome for distinguishing a real start from a repeated one

mod orchestrator;
mod run_config;

pub use orchestrator::{BatchOrchestrator, StartOutcome};
pub use run_config::RunConfig;
