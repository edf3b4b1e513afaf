//! Error types for the transport layer

use thiserror::Error;

/// Failures reported by a [`Transport`](super::transport::Transport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// The broker refused or never acknowledged the connection
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Operation requires a live session
    #[error("Not connected")]
    NotConnected,

    /// A publish request could not be handed to the client
    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// A subscribe request could not be handed to the client
    #[error("Subscribe to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("Disconnect failed: {0}")]
    Disconnect(String),
}
