//! YAML configuration for talking to one Senziio device
//!
//! ```yaml
//! mqtt:
//!   broker_host: 192.168.1.10
//!   username: homeassistant
//!   password: secret
//! device:
//!   device_id: theia-pro-2F3D56AA1234
//!   model: Theia Pro
//!   name: Living room
//! request_timeout_secs: 10
//! ```

use crate::error::{ConfigError, ConfigResult};
use senziio_mqtt::MqttConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

fn default_request_timeout_secs() -> u64 {
    10
}

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct SenziioConfig {
    /// Broker connection settings
    #[serde(default)]
    pub mqtt: MqttConfig,
    /// The device to talk to
    pub device: DeviceConfig,
    /// How long to wait for a device-info response, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Identity of the configured device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    pub device_id: String,
    pub model: String,
    /// Friendly name, defaults to the device id
    #[serde(default)]
    pub name: Option<String>,
}

impl DeviceConfig {
    /// Friendly name, falling back to the device id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.device_id)
    }
}

impl SenziioConfig {
    /// Device-info response timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> ConfigResult<()> {
        if self.device.device_id.trim().is_empty() {
            return Err(invalid("device.device_id", "cannot be empty"));
        }
        if self.device.model.trim().is_empty() {
            return Err(invalid("device.model", "cannot be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be greater than zero"));
        }
        if self.mqtt.broker_host.is_empty() {
            return Err(invalid("mqtt.broker_host", "cannot be empty"));
        }
        if self.mqtt.password.is_some() && self.mqtt.username.is_none() {
            return Err(invalid("mqtt.password", "requires mqtt.username"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Load and validate a configuration file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<SenziioConfig> {
    let path = path.as_ref();
    debug!("Loading configuration file: {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_str(&content, path)
}

/// Parse and validate configuration from a string
///
/// `source_path` is only used in error messages.
pub fn load_config_str(content: &str, source_path: &Path) -> ConfigResult<SenziioConfig> {
    let config: SenziioConfig =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;
    config.validate()?;
    Ok(config)
}
