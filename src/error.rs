//! Error type shared by every stage of an experiment run.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type returned by external collaborators (the sampler and its density model).
pub type AdapterError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while configuring, running, diagnosing or reporting an experiment.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration was rejected before any run was attempted.
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// The requested target density is not part of the registry.
    #[error("experiment type `{name}` is not supported; supported types are: {supported}")]
    UnsupportedExperiment {
        /// Name that failed to resolve.
        name: String,
        /// Comma separated list of supported names.
        supported: String,
    },

    /// A diagnostic was requested on data that cannot support it.
    #[error("{what} needs at least {required} chains, found {found}")]
    InsufficientData {
        /// The diagnostic that was requested.
        what: &'static str,
        /// Minimum number of chains.
        required: usize,
        /// Number of chains in the bundle.
        found: usize,
    },

    /// The sampler failed or handed back an unusable bundle.
    #[error("sampler run failed: {0}")]
    AdapterFailure(#[source] AdapterError),

    /// A single report artifact could not be produced.
    #[error("failed to write artifact `{artifact}`: {reason}")]
    ArtifactWrite {
        /// File name of the artifact.
        artifact: &'static str,
        /// Underlying cause.
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration could not be parsed.
    #[error("could not parse parameters: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn adapter(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        Error::AdapterFailure(msg.into())
    }
}
