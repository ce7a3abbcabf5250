//! Device identity and model key derivation

use std::fmt;

/// Derive the model key used in topic names
///
/// The model name is split on whitespace, lowercased and joined with `-`,
/// so `"Theia Pro"` becomes `"theia-pro"`.
pub fn model_key(device_model: &str) -> String {
    device_model
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Identity of one physical device
///
/// Immutable once built; the model key is derived at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    device_id: String,
    device_model: String,
    model_key: String,
}

impl DeviceIdentity {
    /// Create an identity, deriving the model key from `device_model`
    pub fn new(device_id: impl Into<String>, device_model: impl Into<String>) -> Self {
        let device_model = device_model.into();
        Self {
            device_id: device_id.into(),
            model_key: model_key(&device_model),
            device_model,
        }
    }

    /// Opaque device identifier, e.g. `theia-pro-2F3D56AA1234`
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Model name as reported by the device, e.g. `Theia Pro`
    pub fn device_model(&self) -> &str {
        &self.device_model
    }

    /// Topic segment derived from the model, e.g. `theia-pro`
    pub fn model_key(&self) -> &str {
        &self.model_key
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.device_id, self.device_model)
    }
}
