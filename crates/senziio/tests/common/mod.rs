//! Test transports for exercising device requests
//!
//! `ScriptedTransport` plays the part of a device: when a device-info request
//! is published it answers on every registered response callback according
//! to its script, and it counts how often subscriptions are released.

#![allow(dead_code)]

use async_trait::async_trait;
use senziio_mqtt::{
    MessageCallback, MqttMessage, QoS, Subscription, Transport, TransportError, TransportResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const A_DEVICE_ID: &str = "theia-pro-2F3D56AA1234";
pub const A_DEVICE_MODEL: &str = "Theia Pro";
pub const INFO_RES_TOPIC: &str = "cmd/theia-pro/theia-pro-2F3D56AA1234/device-info/res";
pub const INFO_REQ_TOPIC: &str = "cmd/theia-pro/theia-pro-2F3D56AA1234/device-info/req";

pub const DEVICE_INFO_PAYLOAD: &str = r#"{"model":"Theia Pro","fw-version":"1.0.0","hw-version":"1.0.0",
 "serial-number":"theia-pro-2F3X56E2ABCD",
 "mac-wifi":"2F:3D:56:E2:0A:BB","mac-ethernet":"2F:3D:56:E2:0A:FF"}"#;

/// How the fake device reacts to a published request
#[derive(Debug, Clone)]
pub enum Reply {
    /// Never answer
    Silent,
    /// Answer before `publish` returns
    Immediately(Vec<String>),
    /// Answer from a spawned task after a delay
    After(Duration, Vec<String>),
}

impl Reply {
    pub fn immediately(payload: &str) -> Self {
        Reply::Immediately(vec![payload.to_string()])
    }

    pub fn after(delay: Duration, payload: &str) -> Self {
        Reply::After(delay, vec![payload.to_string()])
    }
}

struct Registered {
    topic: String,
    callback: MessageCallback,
}

#[derive(Default)]
struct Counters {
    subscribes: AtomicUsize,
    publishes: AtomicUsize,
    releases: AtomicUsize,
}

pub struct ScriptedTransport {
    reply: Reply,
    fail_subscribe: bool,
    fail_publish: bool,
    /// Callbacks stay here even after release, to simulate late deliveries
    callbacks: Arc<Mutex<Vec<Registered>>>,
    counters: Arc<Counters>,
    published: Mutex<Vec<MqttMessage>>,
}

impl ScriptedTransport {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            fail_subscribe: false,
            fail_publish: false,
            callbacks: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(Counters::default()),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_subscribe() -> Self {
        Self {
            fail_subscribe: true,
            ..Self::new(Reply::Silent)
        }
    }

    pub fn failing_publish() -> Self {
        Self {
            fail_publish: true,
            ..Self::new(Reply::Silent)
        }
    }

    pub fn subscribe_count(&self) -> usize {
        self.counters.subscribes.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> usize {
        self.counters.publishes.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<MqttMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Deliver a message to every callback ever registered on `topic`
    pub fn deliver(&self, topic: &str, payload: &str) {
        deliver_to(&self.callbacks, topic, payload);
    }
}

fn deliver_to(callbacks: &Mutex<Vec<Registered>>, topic: &str, payload: &str) {
    let targets: Vec<MessageCallback> = callbacks
        .lock()
        .unwrap()
        .iter()
        .filter(|registered| registered.topic == topic)
        .map(|registered| registered.callback.clone())
        .collect();
    for callback in targets {
        callback(MqttMessage::new(topic, payload, QoS::AtLeastOnce));
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> TransportResult<()> {
        if self.fail_publish {
            return Err(TransportError::NotConnected);
        }
        self.counters.publishes.fetch_add(1, Ordering::SeqCst);
        self.published
            .lock()
            .unwrap()
            .push(MqttMessage::new(topic, payload, qos).with_retain(retain));

        let res_topic = topic.replace("/device-info/req", "/device-info/res");
        match &self.reply {
            Reply::Silent => {}
            Reply::Immediately(payloads) => {
                for payload in payloads {
                    deliver_to(&self.callbacks, &res_topic, payload);
                }
            }
            Reply::After(delay, payloads) => {
                let callbacks = self.callbacks.clone();
                let delay = *delay;
                let payloads = payloads.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    for payload in &payloads {
                        deliver_to(&callbacks, &res_topic, payload);
                    }
                });
            }
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
        _qos: QoS,
    ) -> TransportResult<Subscription> {
        if self.fail_subscribe {
            return Err(TransportError::Client("subscription rejected".to_string()));
        }
        self.counters.subscribes.fetch_add(1, Ordering::SeqCst);
        self.callbacks.lock().unwrap().push(Registered {
            topic: topic.to_string(),
            callback,
        });

        let counters = self.counters.clone();
        Ok(Subscription::new(topic, move || {
            counters.releases.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
