//! MQTT transport capability for Senziio devices
//!
//! This crate provides the publish/subscribe primitive the device layer is
//! written against. It does not implement a broker; it either talks to one
//! through `rumqttc` ([`BrokerTransport`]) or routes messages in-process
//! ([`LoopbackTransport`]).
//!
//! Subscriptions are scoped resources: [`Transport::subscribe`] hands back a
//! [`Subscription`] guard that releases the subscription exactly once, either
//! through [`Subscription::unsubscribe`] or when the guard is dropped.
//!
//! # Example
//!
//! ```ignore
//! use senziio_mqtt::{LoopbackTransport, QoS, Transport};
//! use std::sync::Arc;
//!
//! let transport = LoopbackTransport::new();
//! let subscription = transport
//!     .subscribe("dt/theia-pro/+/co2", Arc::new(|msg| println!("{}", msg.payload_str())), QoS::AtLeastOnce)
//!     .await?;
//! transport.publish("dt/theia-pro/abc/co2", b"{\"co2\": 510}".to_vec(), QoS::AtLeastOnce, false).await?;
//! subscription.unsubscribe();
//! ```

mod broker;
mod config;
mod error;
mod filters;
mod loopback;
mod message;
mod topic;
mod transport;

pub use broker::BrokerTransport;
pub use config::MqttConfig;
pub use error::{TransportError, TransportResult};
pub use loopback::LoopbackTransport;
pub use message::{MqttMessage, QoS};
pub use topic::{topic_matches, validate_filter, RouteId, TopicRouter};
pub use transport::{MessageCallback, Subscription, Transport};
