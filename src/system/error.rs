use thiserror::Error;

/// A reading the host could not provide
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("{0} is not available on this host")]
    Unavailable(&'static str),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of the OS suspend action
#[derive(Debug, Error)]
pub enum SuspendError {
    #[error("Suspend is not supported on {0}")]
    Unsupported(&'static str),

    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    Failed { command: String, status: String },
}
