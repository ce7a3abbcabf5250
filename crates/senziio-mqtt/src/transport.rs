//! The publish/subscribe capability and its scoped subscription resource

use crate::error::TransportResult;
use crate::message::{MqttMessage, QoS};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Callback invoked for every message delivered on a subscribed topic
///
/// Callbacks run on whatever task the transport delivers messages from, so
/// they must be cheap and must not block.
pub type MessageCallback = Arc<dyn Fn(MqttMessage) + Send + Sync>;

/// Asynchronous publish/subscribe primitive
///
/// Implementations own connection management, QoS handling and delivery.
/// Both operations report a refusal as an error instead of queueing the
/// request behind a connection that may never come back.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a payload to a topic
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> TransportResult<()>;

    /// Subscribe a callback to a topic filter
    ///
    /// The returned [`Subscription`] keeps the callback registered until it is
    /// released or dropped.
    async fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
        qos: QoS,
    ) -> TransportResult<Subscription>;
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// An active subscription, released exactly once
///
/// The release action runs on the first of [`Subscription::unsubscribe`] or
/// drop. This makes cleanup hold on every exit path of the owner, including
/// early returns and cancellation of an enclosing future.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    topic: String,
    release: Option<ReleaseFn>,
}

impl Subscription {
    /// Create a subscription guard with the action that releases it
    pub fn new(topic: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            topic: topic.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Create a guard with nothing to release
    pub fn noop(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            release: None,
        }
    }

    /// The topic filter this subscription covers
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether the release action has not run yet
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Release the subscription now
    pub fn unsubscribe(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            trace!(topic = %self.topic, "Releasing subscription");
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}
