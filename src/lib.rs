//! Bulkrun - sequential bulk processing for storefront records
//!
//! Bulkrun takes an ordered list of records, validates them up front, then
//! drives each one through a caller-supplied operation: one at a time, under a
//! per-item timeout, with bounded linear-backoff retries and cooperative
//! cancellation. Progress is derived from item state and published as
//! snapshots.

pub mod domain;
pub mod error;
pub mod executor;
pub mod input;
pub mod progress;
pub mod retry;
pub mod runner;
pub mod validation;

pub use error::{BulkError, Result};
