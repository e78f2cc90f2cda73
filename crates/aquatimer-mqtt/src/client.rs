//! Message transport over rumqttc

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use aquatimer_core::{InboundMessage, MessageError, MessageTransport};

use crate::config::MqttConfig;
use crate::error::Result;

// ----------------------------------------------------------------------------
// MQTT Message Transport
// ----------------------------------------------------------------------------

/// [`MessageTransport`] backed by an MQTT broker
///
/// The rumqttc event loop runs on its own task. It forwards every publish it
/// receives, and resubscribes to every known topic after a reconnect.
///
/// Requests never wait on the event loop: while the broker is unreachable the
/// request queue fills up and further subscribes and publishes fail at once.
pub struct MqttMessageTransport {
    client: AsyncClient,
    inbound: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    subscriptions: Arc<RwLock<Vec<String>>>,
    closing: Arc<AtomicBool>,
    event_task: JoinHandle<()>,
}

impl MqttMessageTransport {
    /// Create the client and start polling the broker connection
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: &MqttConfig) -> Result<Self> {
        let address = config.broker_address()?;
        let client_id = config.effective_client_id();

        let mut options = MqttOptions::new(client_id.clone(), address.host.clone(), address.port);
        options.set_keep_alive(config.keep_alive());
        if let Some((username, password)) = address.credentials {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, config.channel_capacity);
        info!(
            "Connecting to MQTT broker {}:{} as {}",
            address.host, address.port, client_id
        );

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let subscriptions = Arc::new(RwLock::new(Vec::new()));
        let closing = Arc::new(AtomicBool::new(false));

        let event_task = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            inbound_tx,
            subscriptions.clone(),
            closing.clone(),
            config.reconnect_delay(),
        ));

        Ok(Self {
            client,
            inbound: Mutex::new(inbound_rx),
            subscriptions,
            closing,
            event_task,
        })
    }
}

impl Drop for MqttMessageTransport {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

#[async_trait]
impl MessageTransport for MqttMessageTransport {
    async fn subscribe(&self, topic: &str) -> std::result::Result<(), MessageError> {
        self.client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| MessageError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        let mut subscriptions = self.subscriptions.write().await;
        if !subscriptions.iter().any(|known| known == topic) {
            subscriptions.push(topic.to_string());
        }
        info!("Subscribed to {}", topic);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> std::result::Result<(), MessageError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(MessageError::Closed);
        }
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| MessageError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn next_message(&self) -> Option<InboundMessage> {
        self.inbound.lock().await.recv().await
    }

    async fn disconnect(&self) -> std::result::Result<(), MessageError> {
        if self.closing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.client
            .try_disconnect()
            .map_err(|e| MessageError::Other(e.to_string()))?;
        info!("Disconnected from MQTT broker");
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Event Loop
// ----------------------------------------------------------------------------

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    inbound: mpsc::UnboundedSender<InboundMessage>,
    subscriptions: Arc<RwLock<Vec<String>>>,
    closing: Arc<AtomicBool>,
    reconnect_delay: Duration,
) {
    let mut sessions = 0u64;

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                if inbound.send(message).is_err() {
                    debug!("Inbound receiver dropped, stopping MQTT event loop");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                sessions += 1;
                info!("MQTT connected");
                if sessions > 1 {
                    resubscribe(&client, &subscriptions).await;
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("MQTT disconnect sent, stopping event loop");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if closing.load(Ordering::Acquire) {
                    break;
                }
                error!("MQTT connection error: {}", e);
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
}

async fn resubscribe(client: &AsyncClient, subscriptions: &RwLock<Vec<String>>) {
    for topic in subscriptions.read().await.iter() {
        match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
            Ok(()) => debug!("Resubscribed to {}", topic),
            Err(e) => warn!("Failed to resubscribe to {}: {}", topic, e),
        }
    }
}
