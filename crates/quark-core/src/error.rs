use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The target function of a computation returned an error.
    #[error("evaluation of `{label}` failed: {source}")]
    Evaluation {
        label: String,
        #[source]
        source: anyhow::Error,
    },

    /// A computation kept marking itself stale inside a single flush.
    #[error("`{label}` was re-scheduled more than {limit} times in one flush")]
    RerunLimit { label: String, limit: u32 },

    #[error("computation `{label}` has been disposed")]
    Disposed { label: String },
}

impl Error {
    /// Label of the computation the error originated from.
    pub fn label(&self) -> &str {
        match self {
            Error::Evaluation { label, .. }
            | Error::RerunLimit { label, .. }
            | Error::Disposed { label } => label,
        }
    }
}
