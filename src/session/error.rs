use thiserror::Error;

/// Conditions that end the session supervisor
#[derive(Debug, Error)]
pub enum SessionError {
    /// A payload with a fixed shape failed to serialize. Indicates a bug.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
