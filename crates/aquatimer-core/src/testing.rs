//! In-memory transports for exercising the bridge without hardware
//!
//! [`MockTimer`] behaves like a tap timer peripheral with the standard GATT
//! layout, and [`MockBroker`] like an MQTT broker connection. Both record what
//! was asked of them so tests can assert on ordering and side effects.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::attributes::{AttributeTable, ServiceId};
use crate::errors::{ConnectError, MessageError, TransportFault};
use crate::transport::{CharacteristicRef, DeviceTransport, InboundMessage, MessageTransport};

// ----------------------------------------------------------------------------
// Mock Timer
// ----------------------------------------------------------------------------

/// A call observed by [`MockTimer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Scan { device_name: String },
    Connect,
    DiscoverServices,
    Read { uuid: Uuid },
    WriteStarted { uuid: Uuid, frame: Vec<u8> },
    WriteFinished { uuid: Uuid },
    Disconnect,
}

#[derive(Debug)]
struct TimerState {
    frames: HashMap<Uuid, Vec<u8>>,
    read_faults: HashMap<Uuid, TransportFault>,
    calls: Vec<DeviceCall>,
    services: Vec<Uuid>,
    write_delay: Duration,
    connect_delay: Duration,
    advertising: bool,
    located: bool,
    connected: bool,
}

/// Simulated tap timer peripheral
#[derive(Debug)]
pub struct MockTimer {
    state: Mutex<TimerState>,
}

impl MockTimer {
    /// An advertising, not yet connected timer with factory frames
    pub fn new() -> Arc<Self> {
        let frames = [
            ("battery", vec![0x50]),
            ("on", vec![0x52, 0x01, 0x01]),
            ("status", vec![0x61, 0x01, 0x02]),
            ("time", vec![0x54, 0x04, 0x15, 0x17, 0x04, 0x04]),
            ("cycle1_start", vec![0x64, 0x02, 0x05, 0x1e]),
            ("cycle2_start", vec![0x65, 0x02, 0xff, 0xff]),
            ("cycle_duration", vec![0x62, 0x02, 0x00, 0x1d]),
            ("cycle_frequency", vec![0x63, 0x03, 0x00, 0x04, 0x7f]),
            ("manual_time_left", vec![0x69, 0x03, 0x01, 0x00, 0x0a]),
            ("rain_delay_time", vec![0x66, 0x01, 0x03]),
        ]
        .into_iter()
        .map(|(name, frame)| (characteristic_of(name), frame))
        .collect();

        Arc::new(Self {
            state: Mutex::new(TimerState {
                frames,
                read_faults: HashMap::new(),
                calls: Vec::new(),
                services: ServiceId::REQUIRED.iter().map(|s| s.uuid()).collect(),
                write_delay: Duration::ZERO,
                connect_delay: Duration::ZERO,
                advertising: true,
                located: false,
                connected: false,
            }),
        })
    }

    /// A timer that is already connected, for facade-level tests
    pub fn connected() -> Arc<Self> {
        let mock = Self::new();
        {
            let mut state = mock.lock();
            state.located = true;
            state.connected = true;
        }
        mock
    }

    pub fn set_frame(&self, attribute: &str, frame: Vec<u8>) {
        self.lock().frames.insert(characteristic_of(attribute), frame);
    }

    pub fn frame(&self, attribute: &str) -> Option<Vec<u8>> {
        self.lock().frames.get(&characteristic_of(attribute)).cloned()
    }

    pub fn fail_reads(&self, attribute: &str, fault: TransportFault) {
        self.lock()
            .read_faults
            .insert(characteristic_of(attribute), fault);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.lock().write_delay = delay;
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.lock().connect_delay = delay;
    }

    pub fn set_advertising(&self, advertising: bool) {
        self.lock().advertising = advertising;
    }

    pub fn set_services(&self, services: Vec<Uuid>) {
        self.lock().services = services;
    }

    /// Simulate the peripheral dropping the link
    pub fn drop_link(&self) {
        self.lock().connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.lock().calls.clone()
    }

    /// Frames written so far, in order
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::WriteStarted { uuid, frame } => Some((*uuid, frame.clone())),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Characteristic UUID of a standard-table attribute
pub fn characteristic_of(attribute: &str) -> Uuid {
    AttributeTable::standard()
        .lookup(attribute)
        .map(|d| d.characteristic)
        .unwrap_or_else(|| panic!("unknown attribute {}", attribute))
}

#[async_trait]
impl DeviceTransport for MockTimer {
    async fn scan(&self, device_name: &str, window: Duration) -> Result<(), ConnectError> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::Scan {
            device_name: device_name.to_string(),
        });
        if !state.advertising {
            return Err(ConnectError::DeviceNotFound {
                name: device_name.to_string(),
                window_ms: window.as_millis() as u64,
            });
        }
        state.located = true;
        Ok(())
    }

    async fn connect(&self) -> Result<(), ConnectError> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(DeviceCall::Connect);
            if !state.located {
                return Err(ConnectError::Transport("no device located".into()));
            }
            state.connect_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.lock().connected = true;
        Ok(())
    }

    async fn discover_services(&self) -> Result<Vec<Uuid>, ConnectError> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::DiscoverServices);
        if !state.connected {
            return Err(ConnectError::Transport("not connected".into()));
        }
        Ok(state.services.clone())
    }

    async fn read(&self, characteristic: CharacteristicRef) -> Result<Vec<u8>, TransportFault> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::Read {
            uuid: characteristic.uuid,
        });
        if !state.connected {
            return Err(TransportFault::Disconnected);
        }
        if let Some(fault) = state.read_faults.get(&characteristic.uuid) {
            return Err(fault.clone());
        }
        state
            .frames
            .get(&characteristic.uuid)
            .cloned()
            .ok_or(TransportFault::CharacteristicNotFound {
                service: characteristic.service,
                uuid: characteristic.uuid,
            })
    }

    async fn write(
        &self,
        characteristic: CharacteristicRef,
        frame: &[u8],
    ) -> Result<(), TransportFault> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(DeviceCall::WriteStarted {
                uuid: characteristic.uuid,
                frame: frame.to_vec(),
            });
            if !state.connected {
                return Err(TransportFault::Disconnected);
            }
            state.write_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        state.frames.insert(characteristic.uuid, frame.to_vec());
        state.calls.push(DeviceCall::WriteFinished {
            uuid: characteristic.uuid,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportFault> {
        let mut state = self.lock();
        state.calls.push(DeviceCall::Disconnect);
        state.connected = false;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Mock Broker
// ----------------------------------------------------------------------------

/// A message published through [`MockBroker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Publication {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    subscriptions: Vec<String>,
    published: Vec<Publication>,
    publish_faults: VecDeque<MessageError>,
    subscribe_faults: VecDeque<MessageError>,
    publishes_stalled: bool,
    disconnected: bool,
}

/// Simulated broker connection
#[derive(Debug)]
pub struct MockBroker {
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    published_tx: mpsc::UnboundedSender<Publication>,
    published_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Publication>>,
    state: Mutex<BrokerState>,
}

impl MockBroker {
    pub fn new() -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (published_tx, published_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            published_tx,
            published_rx: tokio::sync::Mutex::new(published_rx),
            state: Mutex::new(BrokerState::default()),
        })
    }

    /// Deliver a message as if it arrived from the broker
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) {
        let _ = self.inbound_tx.send(InboundMessage::new(topic, payload));
    }

    /// Wait for the next publication, in publish order
    pub async fn next_publication(&self, wait: Duration) -> Option<Publication> {
        let mut rx = self.published_rx.lock().await;
        tokio::time::timeout(wait, rx.recv()).await.ok().flatten()
    }

    /// Wait for the next publication on `topic`, skipping others
    pub async fn next_publication_on(&self, topic: &str, wait: Duration) -> Option<Publication> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let publication = self.next_publication(remaining).await?;
            if publication.topic == topic {
                return Some(publication);
            }
        }
    }

    /// Fail the next publish with `fault`, then recover
    pub fn fail_next_publish(&self, fault: MessageError) {
        self.lock().publish_faults.push_back(fault);
    }

    /// Fail the next subscribe with `fault`, then recover
    pub fn fail_next_subscribe(&self, fault: MessageError) {
        self.lock().subscribe_faults.push_back(fault);
    }

    /// While stalled, publishes never complete, like a broker whose request
    /// queue has filled up
    pub fn stall_publishes(&self, stalled: bool) {
        self.lock().publishes_stalled = stalled;
    }

    pub fn published(&self) -> Vec<Publication> {
        self.lock().published.clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.lock().subscriptions.clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.lock().disconnected
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MessageTransport for MockBroker {
    async fn subscribe(&self, topic: &str) -> Result<(), MessageError> {
        let mut state = self.lock();
        if let Some(fault) = state.subscribe_faults.pop_front() {
            return Err(fault);
        }
        state.subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), MessageError> {
        let publication = Publication {
            topic: topic.to_string(),
            payload,
        };
        let stalled = {
            let mut state = self.lock();
            if state.disconnected {
                return Err(MessageError::Closed);
            }
            if let Some(fault) = state.publish_faults.pop_front() {
                return Err(fault);
            }
            state.publishes_stalled
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        self.lock().published.push(publication.clone());
        let _ = self.published_tx.send(publication);
        Ok(())
    }

    async fn next_message(&self) -> Option<InboundMessage> {
        if self.lock().disconnected {
            return None;
        }
        self.inbound_rx.lock().await.recv().await
    }

    async fn disconnect(&self) -> Result<(), MessageError> {
        self.lock().disconnected = true;
        Ok(())
    }
}
