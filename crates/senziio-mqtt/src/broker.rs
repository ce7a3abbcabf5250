//! Broker-backed transport built on `rumqttc`

use crate::config::MqttConfig;
use crate::error::{TransportError, TransportResult};
use crate::filters::BrokerFilters;
use crate::message::{MqttMessage, QoS};
use crate::topic::{validate_filter, TopicRouter};
use crate::transport::{MessageCallback, Subscription, Transport};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Capacity of the request channel between the client and its event loop
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Transport talking to an MQTT broker
///
/// A background task drives the `rumqttc` event loop, tracks whether the
/// broker has acknowledged the connection and routes every incoming publish
/// to the local subscribers whose filters match it. Filters shared by
/// several subscriptions are subscribed at the broker once, and subscribed
/// again whenever the broker opens a fresh session.
pub struct BrokerTransport {
    client: AsyncClient,
    router: Arc<TopicRouter>,
    filters: Arc<BrokerFilters>,
    connected: watch::Receiver<bool>,
    eventloop_handle: JoinHandle<()>,
}

impl BrokerTransport {
    /// Start connecting to the configured broker
    ///
    /// Returns immediately; use [`BrokerTransport::wait_connected`] to find
    /// out whether the broker became available.
    pub fn connect(config: &MqttConfig) -> Self {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), REQUEST_CHANNEL_CAPACITY);
        let router = Arc::new(TopicRouter::new());
        let filters = Arc::new(BrokerFilters::new());
        let (connected_tx, connected) = watch::channel(false);

        info!(
            host = %config.broker_host,
            port = config.broker_port,
            client_id = %config.client_id,
            "Connecting to MQTT broker"
        );

        let eventloop_handle = tokio::spawn(drive_eventloop(
            eventloop,
            client.clone(),
            router.clone(),
            filters.clone(),
            connected_tx,
            config.reconnect_delay(),
        ));

        Self {
            client,
            router,
            filters,
            connected,
            eventloop_handle,
        }
    }

    /// Whether the broker has acknowledged the current connection
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Wait until the broker connection is up, or give up after `timeout`
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let mut connected = self.connected.clone();
        let wait = async move {
            while !*connected.borrow_and_update() {
                if connected.changed().await.is_err() {
                    return false;
                }
            }
            true
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(is_up) => is_up,
            Err(_) => {
                warn!(?timeout, "MQTT broker did not become available");
                false
            }
        }
    }

    /// Disconnect from the broker and stop the event loop task
    pub async fn shutdown(self) {
        if let Err(err) = self.client.disconnect().await {
            debug!(%err, "Disconnect request not delivered");
        }
        self.eventloop_handle.abort();
        info!("MQTT transport stopped");
    }

    fn ensure_connected(&self, operation: &str, topic: &str) -> TransportResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            error!(operation, topic = %topic, "MQTT client is not connected");
            Err(TransportError::NotConnected)
        }
    }
}

#[async_trait]
impl Transport for BrokerTransport {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> TransportResult<()> {
        self.ensure_connected("publish", topic)?;
        self.client
            .publish(topic, qos.into(), retain, payload)
            .await
            .map_err(|err| {
                error!(topic = %topic, %err, "Could not publish to MQTT topic");
                TransportError::from(err)
            })?;
        debug!(topic = %topic, qos = qos.level(), retain, "Published message");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
        qos: QoS,
    ) -> TransportResult<Subscription> {
        self.ensure_connected("subscribe", topic)?;
        validate_filter(topic)?;

        // Register locally first so a message racing the SUBACK is not lost
        let id = self.router.add(topic, callback);
        let subscribed = self.filters.acquire(topic, qos, |qos| {
            self.client.try_subscribe(topic, qos.into())
        });
        if let Err(err) = subscribed {
            self.router.remove(id);
            error!(topic = %topic, %err, "Could not subscribe to MQTT topic");
            return Err(err.into());
        }
        debug!(topic = %topic, qos = qos.level(), "Subscribed");

        let router = self.router.clone();
        let filters = self.filters.clone();
        let client = self.client.clone();
        Ok(Subscription::new(topic, move || {
            let Some(filter) = router.remove(id) else {
                return;
            };
            let unsubscribed =
                filters.release(&filter, || client.try_unsubscribe(filter.as_str()));
            if let Err(err) = unsubscribed {
                warn!(topic = %filter, %err, "Could not unsubscribe from MQTT topic");
            }
        }))
    }
}

impl Drop for BrokerTransport {
    fn drop(&mut self) {
        self.eventloop_handle.abort();
    }
}

/// Build rumqttc options from our config
fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
    options.set_keep_alive(config.keep_alive());
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.as_deref().unwrap_or_default());
    }
    options
}

/// Subscribe again to every filter still held by a local subscription
///
/// A broker starting a clean session has forgotten them. Requests are only
/// queued here; the event loop sends them on its next polls.
fn restore_subscriptions(client: &AsyncClient, filters: &BrokerFilters) -> usize {
    if filters.len() == 0 {
        return 0;
    }
    let restored = filters.resubscribe(
        |filter, qos| client.try_subscribe(filter, qos.into()),
        |filter, err| warn!(topic = %filter, %err, "Could not restore MQTT subscription"),
    );
    info!(restored, "Restored MQTT subscriptions");
    restored
}

/// Poll the event loop forever, routing publishes and tracking connection state
async fn drive_eventloop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    router: Arc<TopicRouter>,
    filters: Arc<BrokerFilters>,
    connected: watch::Sender<bool>,
    reconnect_delay: Duration,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(
                    code = ?ack.code,
                    session_present = ack.session_present,
                    "Connected to MQTT broker"
                );
                if !ack.session_present {
                    restore_subscriptions(&client, &filters);
                }
                connected.send_replace(true);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = MqttMessage::from(publish);
                let delivered = router.dispatch(&message);
                if delivered == 0 {
                    debug!(topic = %message.topic, "Dropping message without subscribers");
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker closed the MQTT session");
                connected.send_replace(false);
            }
            Ok(_) => {}
            Err(err) => {
                if connected.send_replace(false) {
                    warn!(%err, "Lost connection to MQTT broker");
                } else {
                    debug!(%err, "MQTT broker still unreachable");
                }
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}
