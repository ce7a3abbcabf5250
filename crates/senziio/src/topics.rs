//! Topic naming for Senziio devices
//!
//! Wire contract with the device fleet:
//!
//! | Purpose | Topic |
//! |---|---|
//! | device-info request | `cmd/{model_key}/{device_id}/device-info/req` |
//! | device-info response | `cmd/{model_key}/{device_id}/device-info/res` |
//! | telemetry | `dt/{model_key}/{device_id}/{entity_key}` |

use crate::identity::DeviceIdentity;
use std::fmt;

/// What a topic is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicPurpose {
    /// Device-info request, published by us
    InfoRequest,
    /// Device-info response, published by the device
    InfoResponse,
    /// Base of the per-entity telemetry topics
    Data,
}

impl TopicPurpose {
    /// Short name of the purpose, e.g. `info_req`
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicPurpose::InfoRequest => "info_req",
            TopicPurpose::InfoResponse => "info_res",
            TopicPurpose::Data => "data",
        }
    }
}

impl fmt::Display for TopicPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete topics for one device, derived once from its identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    info_req: String,
    info_res: String,
    data: String,
}

impl TopicSet {
    /// Derive every topic of the device identified by `identity`
    pub fn new(identity: &DeviceIdentity) -> Self {
        let model_key = identity.model_key();
        let device_id = identity.device_id();
        Self {
            info_req: format!("cmd/{model_key}/{device_id}/device-info/req"),
            info_res: format!("cmd/{model_key}/{device_id}/device-info/res"),
            data: format!("dt/{model_key}/{device_id}"),
        }
    }

    /// Topic serving `purpose`
    pub fn get(&self, purpose: TopicPurpose) -> &str {
        match purpose {
            TopicPurpose::InfoRequest => &self.info_req,
            TopicPurpose::InfoResponse => &self.info_res,
            TopicPurpose::Data => &self.data,
        }
    }

    /// Topic the device-info request is published on
    pub fn info_req(&self) -> &str {
        &self.info_req
    }

    /// Topic the device answers a device-info request on
    pub fn info_res(&self) -> &str {
        &self.info_res
    }

    /// Base of the device's telemetry topics
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Telemetry topic for one entity, e.g. `dt/theia-pro/{id}/co2`
    pub fn entity_topic(&self, entity_key: &str) -> String {
        format!("{}/{}", self.data, entity_key)
    }
}
