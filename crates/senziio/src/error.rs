//! Error types for Senziio device operations and configuration

use senziio_mqtt::TransportError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for device operations
pub type SenziioResult<T> = Result<T, SenziioError>;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors surfaced to callers of device operations
///
/// A device that does not answer, or answers with garbage, is not an error;
/// see [`Senziio::request_info`](crate::Senziio::request_info).
#[derive(Debug, Error)]
pub enum SenziioError {
    /// The MQTT transport refused to subscribe or publish
    #[error("MQTT transport unavailable while trying to {operation} '{topic}': {source}")]
    TransportUnavailable {
        operation: &'static str,
        topic: String,
        #[source]
        source: TransportError,
    },

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SenziioError {
    /// Whether this error means the MQTT transport is not usable
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, SenziioError::TransportUnavailable { .. })
    }
}

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML
    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid configuration value
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
