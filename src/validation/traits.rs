//! Record validation contract
//!
//! A record validator inspects one payload and lists everything wrong with it.
//! An empty list means the record is acceptable.

/// Checks a single payload before any processing starts
pub trait RecordValidator<P>: Send + Sync {
    /// Human-readable problems with `payload`; empty when valid
    fn validate(&self, payload: &P) -> Vec<String>;
}

/// Validator that accepts every record
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<P> RecordValidator<P> for AcceptAll {
    fn validate(&self, _payload: &P) -> Vec<String> {
        Vec::new()
    }
}

/// Adapter turning a closure into a [`RecordValidator`]
pub struct FnValidator<F> {
    f: F,
}

/// Wrap a closure as a record validator
pub fn validator_fn<F>(f: F) -> FnValidator<F> {
    FnValidator { f }
}

impl<P, F> RecordValidator<P> for FnValidator<F>
where
    F: Fn(&P) -> Vec<String> + Send + Sync,
{
    fn validate(&self, payload: &P) -> Vec<String> {
        (self.f)(payload)
    }
}

/// Runs several validators and concatenates their findings
pub struct CompositeValidator<P> {
    validators: Vec<Box<dyn RecordValidator<P>>>,
}

impl<P> CompositeValidator<P> {
    pub fn new() -> Self {
        Self { validators: Vec::new() }
    }

    pub fn with(mut self, validator: impl RecordValidator<P> + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }
}

impl<P> Default for CompositeValidator<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> RecordValidator<P> for CompositeValidator<P> {
    fn validate(&self, payload: &P) -> Vec<String> {
        self.validators.iter().flat_map(|v| v.validate(payload)).collect()
    }
}
