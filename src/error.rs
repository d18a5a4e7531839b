use std::io;

use thiserror::Error;

/// Errors produced while reading instances, configuring trainers and
/// loading models.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying I/O failure
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Malformed instance text
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A parameter received a value outside its valid range
    #[error("{name} {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// A configuration key that no component understands
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// A rule was requested without a hyperparameter it cannot default
    #[error("{rule} requires parameter '{name}'")]
    MissingParameter {
        name: &'static str,
        rule: &'static str,
    },

    /// Persisted bytes are not a valid model
    #[error("invalid model format: {0}")]
    Format(String),

    /// Weight layout differs from the one requested
    #[error("layout mismatch: expected {expected}, found {found}")]
    LayoutMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Trainer buffers were sized for a different weight vector
    #[error("dimension mismatch: expected {expected} weights, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Training was requested without any resolved instance
    #[error("no training instances")]
    NoInstances,

    /// The worker pool for one-vs-all training could not be built
    #[error("thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    pub(crate) fn format(message: impl Into<String>) -> Self {
        Error::Format(message.into())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
