//! Supervisor
//!
//! Owns both transports and sequences the bridge lifecycle:
//! - connecting to the timer (scan, connect, service discovery)
//! - spawning the producer, consumer, notifier and link monitor tasks
//! - cooperative shutdown, releasing the device and the broker connection

use std::sync::Arc;

use aquatimer_core::{
    ConnectError, DeviceTransport, MessageTransport, ServiceId, TimerDevice,
};
use tokio::{
    sync::{mpsc, watch, RwLock},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::error::Result;
use crate::state::{running_flag, BridgeHandle, LinkState, RunningFlag};
use crate::tasks::{ConsumerTask, LinkMonitorTask, NotifierTask, ProducerTask};

// ----------------------------------------------------------------------------
// Connector
// ----------------------------------------------------------------------------

/// Runs the connection sequence and holds the live device facade
pub struct Connector {
    transport: Arc<dyn DeviceTransport>,
    config: BridgeConfig,
    device: RwLock<Option<Arc<TimerDevice>>>,
    state: watch::Sender<LinkState>,
}

impl Connector {
    pub fn new(transport: Arc<dyn DeviceTransport>, config: BridgeConfig) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected(None));
        Self {
            transport,
            config,
            device: RwLock::new(None),
            state,
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    pub fn link_state(&self) -> LinkState {
        self.state.borrow().clone()
    }

    /// The installed facade, if a device is linked
    pub async fn device(&self) -> Option<Arc<TimerDevice>> {
        self.device.read().await.clone()
    }

    pub async fn is_linked(&self) -> bool {
        self.device.read().await.is_some()
    }

    /// Scan, connect and discover services, then install a device facade
    pub async fn establish(&self) -> std::result::Result<(), ConnectError> {
        match self.sequence().await {
            Ok(device) => {
                *self.device.write().await = Some(Arc::new(device));
                self.set_state(LinkState::Ready);
                info!("Connected to {}", self.config.device_name);
                Ok(())
            }
            Err(e) => {
                self.set_state(LinkState::Disconnected(Some(e.clone())));
                Err(e)
            }
        }
    }

    /// Forget the facade after the link dropped underneath it
    pub async fn release(&self) {
        if self.device.write().await.take().is_some() {
            warn!("Lost link to {}", self.config.device_name);
            self.set_state(LinkState::Disconnected(None));
        }
    }

    /// Drop the facade and disconnect the device transport
    pub async fn shutdown(&self) {
        self.device.write().await.take();
        if let Err(e) = self.transport.disconnect().await {
            warn!("Failed to disconnect from {}: {}", self.config.device_name, e);
        }
        self.set_state(LinkState::Stopped);
    }

    async fn sequence(&self) -> std::result::Result<TimerDevice, ConnectError> {
        let name = &self.config.device_name;

        self.set_state(LinkState::Scanning);
        info!("Scanning for {}", name);
        let window = self.config.scan_timeout;
        match timeout(window, self.transport.scan(name, window)).await {
            Ok(Ok(())) => debug!("Found {}", name),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(ConnectError::DeviceNotFound {
                    name: name.clone(),
                    window_ms: window.as_millis() as u64,
                })
            }
        }

        self.set_state(LinkState::Connecting);
        let connect_timeout = self.config.connect_timeout;
        match timeout(connect_timeout, self.transport.connect()).await {
            Ok(Ok(())) => debug!("Connected to {}, discovering services", name),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                self.abandon().await;
                return Err(ConnectError::ConnectTimeout {
                    duration_ms: connect_timeout.as_millis() as u64,
                });
            }
        }

        self.set_state(LinkState::ServiceDiscovery);
        let services = match timeout(self.config.io_timeout, self.transport.discover_services())
            .await
        {
            Ok(Ok(services)) => services,
            Ok(Err(e)) => {
                self.abandon().await;
                return Err(e);
            }
            Err(_) => {
                self.abandon().await;
                return Err(ConnectError::Transport("service discovery timed out".into()));
            }
        };

        if let Some(missing) = ServiceId::REQUIRED
            .into_iter()
            .find(|service| !services.contains(&service.uuid()))
        {
            self.abandon().await;
            return Err(ConnectError::ServiceMissing(missing));
        }

        Ok(TimerDevice::new(self.transport.clone())
            .with_literal_policy(self.config.literal_policy())
            .with_io_timeout(self.config.io_timeout))
    }

    /// Best-effort disconnect after a failed attempt
    async fn abandon(&self) {
        if let Err(e) = self.transport.disconnect().await {
            debug!("Disconnect after failed attempt: {}", e);
        }
    }

    fn set_state(&self, state: LinkState) {
        debug!("Link state: {}", state);
        self.state.send_replace(state);
    }
}

// ----------------------------------------------------------------------------
// Supervisor
// ----------------------------------------------------------------------------

/// Runs the bridge until stopped
pub struct Supervisor {
    config: BridgeConfig,
    connector: Arc<Connector>,
    messages: Arc<dyn MessageTransport>,
    handle: BridgeHandle,
    running: RunningFlag,
}

impl Supervisor {
    pub fn new(
        config: BridgeConfig,
        device: Arc<dyn DeviceTransport>,
        messages: Arc<dyn MessageTransport>,
    ) -> Self {
        let (handle, running) = running_flag();
        Self {
            connector: Arc::new(Connector::new(device, config.clone())),
            config,
            messages,
            handle,
            running,
        }
    }

    /// Handle used to request shutdown
    pub fn handle(&self) -> BridgeHandle {
        self.handle.clone()
    }

    /// Watch the device link state
    pub fn state(&self) -> watch::Receiver<LinkState> {
        self.connector.subscribe_state()
    }

    /// Connect, run every bridge task until stopped, then release both transports
    ///
    /// A device that cannot be reached is not fatal: the bridge keeps serving
    /// the command topic and the link monitor retries in the background.
    pub async fn run(self) -> Result<()> {
        self.config.validate()?;
        info!("Starting bridge for {}", self.config.device_name);

        if let Err(e) = self.connector.establish().await {
            warn!(
                "Could not connect to {}: {}; running without a device",
                self.config.device_name, e
            );
        }

        let handles = self.spawn_tasks();
        for (task, handle) in handles {
            match handle.await {
                Ok(Ok(())) => debug!("{} task finished", task),
                Ok(Err(e)) => error!("{} task failed: {}", task, e),
                Err(e) => error!("{} task panicked: {}", task, e),
            }
        }

        self.shutdown().await;
        Ok(())
    }

    fn spawn_tasks(&self) -> Vec<(&'static str, JoinHandle<Result<()>>)> {
        let (queue, commands) = mpsc::unbounded_channel();
        let mut handles = Vec::new();

        let producer = ProducerTask::new(
            self.messages.clone(),
            &self.config,
            queue.clone(),
            self.running.clone(),
        );
        handles.push(("producer", tokio::spawn(producer.run())));

        let consumer = ConsumerTask::new(
            commands,
            queue.clone(),
            self.connector.clone(),
            self.messages.clone(),
            &self.config,
            self.running.clone(),
        );
        handles.push(("consumer", tokio::spawn(consumer.run())));

        let battery = NotifierTask::battery(&self.config, queue.clone(), self.running.clone());
        handles.push(("battery notifier", tokio::spawn(battery.run())));

        let state = NotifierTask::state(&self.config, queue, self.running.clone());
        handles.push(("state notifier", tokio::spawn(state.run())));

        if self.config.reconnect_enabled() {
            let monitor = LinkMonitorTask::new(
                self.connector.clone(),
                self.config.reconnect_interval,
                self.running.clone(),
            );
            handles.push(("link monitor", tokio::spawn(monitor.run())));
        } else {
            debug!("Reconnects disabled");
        }

        handles
    }

    async fn shutdown(&self) {
        info!("Shutting down bridge");
        self.connector.shutdown().await;
        if let Err(e) = self.messages.disconnect().await {
            warn!("Failed to disconnect from broker: {}", e);
        }
        info!("Bridge stopped");
    }
}
