//! MQTT broker connection configuration

use serde::Deserialize;
use std::time::Duration;

/// Connection settings for [`BrokerTransport`](crate::BrokerTransport)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker hostname or IP address
    pub broker_host: String,
    /// Broker port
    pub broker_port: u16,
    /// Client identifier presented to the broker
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u16,
    /// Optional username for broker authentication
    pub username: Option<String>,
    /// Optional password, only used together with `username`
    pub password: Option<String>,
    /// Pause after a connection error before polling again, in seconds
    pub reconnect_delay_secs: u16,
}

impl MqttConfig {
    /// Keep-alive interval as a `Duration`
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keep_alive_secs))
    }

    /// Pause between reconnect attempts as a `Duration`
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.reconnect_delay_secs))
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "senziio".to_string(),
            keep_alive_secs: 30,
            username: None,
            password: None,
            reconnect_delay_secs: 5,
        }
    }
}
