//! Senziio device communications
//!
//! Senziio sensors talk MQTT. Telemetry is pushed on `dt/...` topics, and a
//! device answers a device-info request on `cmd/.../device-info/res` after
//! one is published on `cmd/.../device-info/req`. This crate derives those
//! topics from a device's identity and correlates the device-info exchange:
//!
//! - [`DeviceIdentity`] - device id, model and the derived model key
//! - [`TopicSet`] - the topics a device uses, keyed by [`TopicPurpose`]
//! - [`DeviceInfo`] - the decoded device-info response
//! - [`Senziio`] - one device, able to run [`Senziio::request_info`]
//!
//! # Example
//!
//! ```ignore
//! use senziio::Senziio;
//! use senziio_mqtt::LoopbackTransport;
//! use std::sync::Arc;
//!
//! let device = Senziio::new("theia-pro-2F3D56AA1234", "Theia Pro", Arc::new(LoopbackTransport::new()));
//! match device.request_info().await? {
//!     Some(info) => println!("firmware {}", info.fw_version().unwrap_or("?")),
//!     None => println!("device did not answer"),
//! }
//! ```

mod config;
mod device;
mod error;
mod identity;
mod info;
mod topics;

pub use config::{load_config, load_config_str, DeviceConfig, SenziioConfig};
pub use device::Senziio;
pub use error::{ConfigError, ConfigResult, SenziioError, SenziioResult};
pub use identity::{model_key, DeviceIdentity};
pub use info::{DeviceInfo, InfoParseError};
pub use topics::{TopicPurpose, TopicSet};

/// Manufacturer reported for every Senziio device
pub const MANUFACTURER: &str = "Senziio";
