//! Error types for MQTT transport operations

use thiserror::Error;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors raised by a transport when it refuses to publish or subscribe
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has no usable broker connection
    #[error("MQTT client is not connected")]
    NotConnected,

    /// Topic or topic filter is malformed
    #[error("invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    /// The underlying MQTT client rejected the request
    #[error("MQTT client error: {0}")]
    Client(String),
}

impl From<rumqttc::ClientError> for TransportError {
    fn from(err: rumqttc::ClientError) -> Self {
        TransportError::Client(err.to_string())
    }
}
