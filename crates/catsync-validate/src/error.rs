use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    /// The two comparison passes disagree; one of the catalogs holds
    /// ambiguous keys.
    #[error("inconsistent {what} count: {forward} comparing reference to candidate, {reverse} the other way")]
    Consistency {
        what: &'static str,
        forward: usize,
        reverse: usize,
    },

    #[error("cannot sync: {bucket} is not empty ({keys})")]
    Precondition { bucket: &'static str, keys: String },
}
