//! A Senziio device and its device-info request/response exchange

use crate::config::SenziioConfig;
use crate::error::{SenziioError, SenziioResult};
use crate::identity::DeviceIdentity;
use crate::info::DeviceInfo;
use crate::topics::TopicSet;
use senziio_mqtt::{MessageCallback, MqttMessage, QoS, Transport, TransportError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, instrument, trace, warn};

/// One Senziio device reachable over an MQTT transport
///
/// Construction derives the device's topics and performs no I/O.
pub struct Senziio<T: ?Sized> {
    identity: DeviceIdentity,
    topics: TopicSet,
    transport: Arc<T>,
    timeout: Duration,
}

impl<T: Transport + ?Sized> Senziio<T> {
    /// How long [`Senziio::request_info`] waits for the device by default
    pub const TIMEOUT: Duration = Duration::from_secs(10);

    /// Body of the device-info request; devices do not interpret it
    pub const INFO_REQUEST_PAYLOAD: &'static str = "Device info request";

    /// Create a device handle that waits [`Senziio::TIMEOUT`] for answers
    pub fn new(device_id: impl Into<String>, device_model: impl Into<String>, transport: Arc<T>) -> Self {
        let identity = DeviceIdentity::new(device_id, device_model);
        let topics = TopicSet::new(&identity);
        Self {
            identity,
            topics,
            transport,
            timeout: Self::TIMEOUT,
        }
    }

    /// Create the device described by `config`
    ///
    /// The configuration is validated first, since it may have been built or
    /// edited in code rather than loaded from a file.
    pub fn from_config(config: &SenziioConfig, transport: Arc<T>) -> SenziioResult<Self> {
        config.validate()?;
        Ok(Self::new(
            config.device.device_id.as_str(),
            config.device.model.as_str(),
            transport,
        )
        .with_timeout(config.request_timeout()))
    }

    /// Override how long to wait for a device-info response
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Device identifier
    pub fn id(&self) -> &str {
        self.identity.device_id()
    }

    /// Device id, model and model key
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Topics derived from the device identity
    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    /// How long a device-info request waits for the answer
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Telemetry topic for one of the device's entities
    pub fn entity_topic(&self, entity_key: &str) -> String {
        self.topics.entity_topic(entity_key)
    }

    /// Ask the device for its info and wait for the answer
    ///
    /// Returns:
    /// - `Ok(Some(info))` when the device answered; `info` is empty if the
    ///   answer could not be decoded
    /// - `Ok(None)` when no answer arrived within the timeout
    /// - `Err(SenziioError::TransportUnavailable)` as soon as the transport
    ///   refuses to subscribe or publish
    ///
    /// The response subscription is released on every path, including when
    /// the returned future is dropped before it completes.
    #[instrument(skip(self), fields(device_id = %self.identity.device_id()))]
    pub async fn request_info(&self) -> SenziioResult<Option<DeviceInfo>> {
        let (pending, response) = PendingRequest::new();
        let callback: MessageCallback = Arc::new(move |message: MqttMessage| pending.complete(&message));

        let res_topic = self.topics.info_res();
        let subscription = self
            .transport
            .subscribe(res_topic, callback, QoS::AtLeastOnce)
            .await
            .map_err(|source| transport_unavailable("subscribe", res_topic, source))?;

        let req_topic = self.topics.info_req();
        let published = self
            .transport
            .publish(
                req_topic,
                Self::INFO_REQUEST_PAYLOAD.as_bytes().to_vec(),
                QoS::AtLeastOnce,
                false,
            )
            .await;
        if let Err(source) = published {
            subscription.unsubscribe();
            return Err(transport_unavailable("publish", req_topic, source));
        }
        debug!(topic = %req_topic, "Requested device info");

        let outcome = tokio::time::timeout(self.timeout, response).await;
        subscription.unsubscribe();

        match outcome {
            Ok(Ok(info)) => {
                debug!(fields = info.len(), "Received device info");
                Ok(Some(info))
            }
            Ok(Err(_)) => {
                warn!("Transport dropped the device info subscription");
                Ok(None)
            }
            Err(_) => {
                debug!(timeout = ?self.timeout, "Device did not answer info request");
                Ok(None)
            }
        }
    }
}

fn transport_unavailable(operation: &'static str, topic: &str, source: TransportError) -> SenziioError {
    error!(operation, topic = %topic, %source, "Could not {} MQTT topic", operation);
    SenziioError::TransportUnavailable {
        operation,
        topic: topic.to_string(),
        source,
    }
}

/// State of one in-flight device-info request
///
/// Owned by the response callback. The first delivered message takes the
/// responder; every later delivery finds it gone and is ignored.
struct PendingRequest {
    responder: Mutex<Option<oneshot::Sender<DeviceInfo>>>,
}

impl PendingRequest {
    fn new() -> (Self, oneshot::Receiver<DeviceInfo>) {
        let (tx, rx) = oneshot::channel();
        let pending = Self {
            responder: Mutex::new(Some(tx)),
        };
        (pending, rx)
    }

    fn complete(&self, message: &MqttMessage) {
        let responder = self
            .responder
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(responder) = responder else {
            trace!(topic = %message.topic, "Ignoring repeated device info response");
            return;
        };

        let info = DeviceInfo::from_payload(&message.payload).unwrap_or_else(|err| {
            error!(payload = %message.payload_str(), %err, "Could not parse device info payload");
            DeviceInfo::new()
        });

        if responder.send(info).is_err() {
            trace!(topic = %message.topic, "Device info arrived after the request finished");
        }
    }
}
