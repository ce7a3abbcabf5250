//! Device-info response payload

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a device-info payload could not be decoded
#[derive(Debug, Error)]
pub enum InfoParseError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Metadata a device reports about itself
///
/// No schema is enforced: every key of the response object is kept. String
/// values are stored as-is, numbers and booleans in their JSON text form.
/// `null`, arrays and nested objects carry nothing usable and are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DeviceInfo(BTreeMap<String, String>);

impl DeviceInfo {
    /// An empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a response body
    pub fn from_payload(payload: &[u8]) -> Result<Self, InfoParseError> {
        let value: Value = serde_json::from_slice(payload)?;
        let object = match value {
            Value::Object(object) => object,
            Value::Null => return Err(InfoParseError::NotAnObject("null")),
            Value::Bool(_) => return Err(InfoParseError::NotAnObject("boolean")),
            Value::Number(_) => return Err(InfoParseError::NotAnObject("number")),
            Value::String(_) => return Err(InfoParseError::NotAnObject("string")),
            Value::Array(_) => return Err(InfoParseError::NotAnObject("array")),
        };

        let fields = object
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(s) => Some((key, s)),
                Value::Number(n) => Some((key, n.to_string())),
                Value::Bool(b) => Some((key, b.to_string())),
                Value::Null | Value::Array(_) | Value::Object(_) => None,
            })
            .collect();

        Ok(Self(fields))
    }

    /// Value of `key`, if the device reported it
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Set `key` to `value`, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Whether no field was reported
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of reported fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Model name, `model`
    pub fn model(&self) -> Option<&str> {
        self.get("model")
    }

    /// Firmware version, `fw-version`
    pub fn fw_version(&self) -> Option<&str> {
        self.get("fw-version")
    }

    /// Hardware version, `hw-version`
    pub fn hw_version(&self) -> Option<&str> {
        self.get("hw-version")
    }

    /// Serial number, `serial-number`
    pub fn serial_number(&self) -> Option<&str> {
        self.get("serial-number")
    }

    /// Wi-Fi MAC address, `mac-wifi`
    pub fn mac_wifi(&self) -> Option<&str> {
        self.get("mac-wifi")
    }

    /// Ethernet MAC address, `mac-ethernet`
    pub fn mac_ethernet(&self) -> Option<&str> {
        self.get("mac-ethernet")
    }

    /// Single MAC reported by older firmware
    pub fn mac_address(&self) -> Option<&str> {
        self.get("mac-address")
    }

    /// Consume the info, returning the raw field map
    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl From<BTreeMap<String, String>> for DeviceInfo {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for DeviceInfo {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
