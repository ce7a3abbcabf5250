//! In-process transport that routes published messages straight to subscribers

use crate::error::{TransportError, TransportResult};
use crate::message::{MqttMessage, QoS};
use crate::topic::{validate_filter, TopicRouter};
use crate::transport::{MessageCallback, Subscription, Transport};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Loopback transport for tests and single-process wiring
///
/// Publishing delivers the message synchronously to every matching
/// subscriber before `publish` returns. There is no broker behind it:
/// messages are not retained and nothing survives the process.
pub struct LoopbackTransport {
    router: Arc<TopicRouter>,
    available: AtomicBool,
    published: Mutex<Vec<MqttMessage>>,
}

impl LoopbackTransport {
    /// Create an available loopback transport
    pub fn new() -> Self {
        Self {
            router: Arc::new(TopicRouter::new()),
            available: AtomicBool::new(true),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Toggle availability; an unavailable transport refuses every operation
    pub fn set_available(&self, available: bool) {
        debug!(available, "Loopback transport availability changed");
        self.available.store(available, Ordering::SeqCst);
    }

    /// Whether the transport currently accepts operations
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of active subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.router.len()
    }

    /// All messages published so far, in order
    pub fn published(&self) -> Vec<MqttMessage> {
        self.published_log().clone()
    }

    /// Messages published to one concrete topic, in order
    pub fn published_to(&self, topic: &str) -> Vec<MqttMessage> {
        self.published_log()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    fn published_log(&self) -> std::sync::MutexGuard<'_, Vec<MqttMessage>> {
        // A poisoned log only means a subscriber panicked mid-publish
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_available(&self, operation: &str, topic: &str) -> TransportResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            warn!(operation, topic = %topic, "Loopback transport unavailable");
            Err(TransportError::NotConnected)
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> TransportResult<()> {
        self.ensure_available("publish", topic)?;
        if topic.contains(['+', '#']) {
            return Err(TransportError::InvalidTopic {
                topic: topic.to_string(),
                reason: "wildcards are not allowed in publish topics".to_string(),
            });
        }

        let message = MqttMessage::new(topic, payload, qos).with_retain(retain);
        self.published_log().push(message.clone());

        let delivered = self.router.dispatch(&message);
        debug!(topic = %topic, delivered, "Published message");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
        qos: QoS,
    ) -> TransportResult<Subscription> {
        self.ensure_available("subscribe", topic)?;
        validate_filter(topic)?;

        let id = self.router.add(topic, callback);
        debug!(topic = %topic, qos = qos.level(), "Subscribed");

        let router = self.router.clone();
        Ok(Subscription::new(topic, move || {
            router.remove(id);
        }))
    }
}
