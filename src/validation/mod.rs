//! Input validation for batch submission.
//!
//! Validation runs before anything is processed. It is not fail-fast: every
//! problem across every record is collected so the caller can fix the whole
//! input in one pass.

mod fields;
mod traits;

use std::sync::Arc;

pub use fields::RequiredFields;
pub use traits::{AcceptAll, CompositeValidator, FnValidator, RecordValidator, validator_fn};

/// Error reported for an empty submission
pub const NO_ITEMS_ERROR: &str = "No items provided";

/// Validate a whole submission.
///
/// Returns an empty list when the input may be processed. Record errors are
/// prefixed with the 1-based item number. Pure: the same input always yields
/// the same list.
pub fn validate_batch<P, V>(payloads: &[Arc<P>], validator: &V) -> Vec<String>
where
    V: RecordValidator<P> + ?Sized,
{
    if payloads.is_empty() {
        return vec![NO_ITEMS_ERROR.to_string()];
    }

    payloads
        .iter()
        .enumerate()
        .flat_map(|(index, payload)| {
            validator
                .validate(payload)
                .into_iter()
                .map(move |error| format!("Item {}: {}", index + 1, error))
        })
        .collect()
}
