//! Bridge tasks
//!
//! The bridge is split into small async tasks that share one unbounded
//! command queue:
//!
//! - `ProducerTask`: turns messages on the command topic into queued commands
//! - `ConsumerTask`: the single reader of the queue, and the only task that
//!   touches the device
//! - `NotifierTask`: enqueues a polling command on a fixed interval
//! - `LinkMonitorTask`: retries the connection while no device is linked

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use aquatimer_core::{
    AquaError, AttributeValue, CodecError, Command, DeviceError, InboundMessage, MessageError,
    MessageTransport, Snapshot, TimerDevice,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{BridgeConfig, TopicConfig};
use crate::error::Result;
use crate::state::RunningFlag;
use crate::supervisor::Connector;

/// Sending half of the command queue
pub type CommandSender = mpsc::UnboundedSender<Command>;

/// Receiving half of the command queue, owned by the consumer
pub type CommandReceiver = mpsc::UnboundedReceiver<Command>;

/// Bound a message transport call on `topic`
async fn bounded<T>(
    limit: Duration,
    topic: &str,
    operation: impl Future<Output = std::result::Result<T, MessageError>>,
) -> std::result::Result<T, MessageError> {
    match timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(MessageError::timeout(topic, limit)),
    }
}

// ----------------------------------------------------------------------------
// Producer
// ----------------------------------------------------------------------------

/// Parses inbound command messages and queues them
pub struct ProducerTask {
    messages: Arc<dyn MessageTransport>,
    command_topic: String,
    queue: CommandSender,
    io_timeout: Duration,
    retry_interval: Duration,
    running: RunningFlag,
}

impl ProducerTask {
    pub fn new(
        messages: Arc<dyn MessageTransport>,
        config: &BridgeConfig,
        queue: CommandSender,
        running: RunningFlag,
    ) -> Self {
        Self {
            messages,
            command_topic: config.topics.command.clone(),
            queue,
            io_timeout: config.io_timeout,
            retry_interval: config.subscribe_retry_interval(),
            running,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        if !self.subscribe().await {
            debug!("Stopped before subscribing to {}", self.command_topic);
            return Ok(());
        }
        info!("Listening for commands on {}", self.command_topic);

        loop {
            tokio::select! {
                _ = self.running.stopped() => break,
                message = self.messages.next_message() => match message {
                    Some(message) => self.handle_message(message),
                    None => {
                        debug!("Message transport closed, stopping producer");
                        break;
                    }
                }
            }
        }

        info!("Command producer stopped");
        Ok(())
    }

    /// Subscribe to the command topic, retrying until it succeeds
    ///
    /// Returns `false` if the bridge stopped first.
    async fn subscribe(&mut self) -> bool {
        loop {
            let attempt = bounded(
                self.io_timeout,
                &self.command_topic,
                self.messages.subscribe(&self.command_topic),
            )
            .await;
            match attempt {
                Ok(()) => return true,
                Err(e) => warn!(
                    "Failed to subscribe to {}: {}; retrying in {:?}",
                    self.command_topic, e, self.retry_interval
                ),
            }

            tokio::select! {
                _ = self.running.stopped() => return false,
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }
    }

    fn handle_message(&self, message: InboundMessage) {
        if message.topic != self.command_topic {
            debug!("Ignoring message on {}", message.topic);
            return;
        }

        match Command::parse(&message.payload) {
            Ok(command) => {
                debug!("Queued command {}", command);
                if self.queue.send(command).is_err() {
                    warn!("Command queue closed, dropping command");
                }
            }
            Err(e) => warn!(
                "Dropping malformed command {:?}: {}",
                String::from_utf8_lossy(&message.payload),
                AquaError::from(e)
            ),
        }
    }
}

// ----------------------------------------------------------------------------
// Consumer
// ----------------------------------------------------------------------------

/// Executes queued commands against the device, one at a time
pub struct ConsumerTask {
    commands: CommandReceiver,
    queue: CommandSender,
    connector: Arc<Connector>,
    messages: Arc<dyn MessageTransport>,
    topics: TopicConfig,
    publish_timeout: Duration,
    running: RunningFlag,
}

impl ConsumerTask {
    pub fn new(
        commands: CommandReceiver,
        queue: CommandSender,
        connector: Arc<Connector>,
        messages: Arc<dyn MessageTransport>,
        config: &BridgeConfig,
        running: RunningFlag,
    ) -> Self {
        Self {
            commands,
            queue,
            connector,
            messages,
            topics: config.topics.clone(),
            publish_timeout: config.io_timeout,
            running,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Command consumer starting");

        loop {
            tokio::select! {
                _ = self.running.stopped() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.process(command).await,
                    None => {
                        debug!("Command queue closed, stopping consumer");
                        break;
                    }
                }
            }
        }

        info!("Command consumer stopped");
        Ok(())
    }

    async fn process(&self, command: Command) {
        let Some(device) = self.connector.device().await else {
            warn!("No device linked, dropping command {}", command);
            return;
        };

        let result = match &command {
            Command::Get { .. } if command.is_get_all() => self.publish_snapshot(&device).await,
            Command::Get { item } => self.publish_attribute(&device, item).await,
            Command::Set { item, value } => self.apply(&device, item, value.clone()).await,
        };

        let Err(e) = result else {
            return;
        };
        error!("Command {} failed: {}", command, e);

        match &e {
            AquaError::Device(err) if err.is_disconnect() => self.connector.release().await,
            AquaError::Device(DeviceError::Codec(CodecError::ProtocolMismatch { .. })) => warn!(
                "Device sent unexpected protocol constants; set bridge.strict_literals = false to accept them"
            ),
            _ => {}
        }
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> std::result::Result<(), AquaError> {
        bounded(
            self.publish_timeout,
            topic,
            self.messages.publish(topic, payload),
        )
        .await?;
        Ok(())
    }

    async fn publish_snapshot(&self, device: &TimerDevice) -> std::result::Result<(), AquaError> {
        let snapshot = device.snapshot_all().await?;
        let payload = serde_json::to_vec(&snapshot)?;
        self.publish(&self.topics.info, payload).await?;
        debug!("Published snapshot of {} attributes", snapshot.len());
        Ok(())
    }

    async fn publish_attribute(
        &self,
        device: &TimerDevice,
        item: &str,
    ) -> std::result::Result<(), AquaError> {
        let value = device.read(item).await?;
        let topic = self.topics.topic_for(item);

        let mut payload = Snapshot::new();
        payload.insert(item.to_string(), value);
        self.publish(topic, serde_json::to_vec(&payload)?).await?;
        debug!("Published {} to {}", item, topic);
        Ok(())
    }

    async fn apply(
        &self,
        device: &TimerDevice,
        item: &str,
        value: AttributeValue,
    ) -> std::result::Result<(), AquaError> {
        device.write(item, value).await?;
        info!("Updated {}", item);

        // publish the resulting state once the write has landed
        if self.queue.send(Command::get_all()).is_err() {
            warn!("Command queue closed, skipping state refresh");
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Notifiers
// ----------------------------------------------------------------------------

/// Enqueues the same command on a fixed interval
pub struct NotifierTask {
    name: &'static str,
    command: Command,
    initial_delay: Duration,
    interval: Duration,
    queue: CommandSender,
    running: RunningFlag,
}

impl NotifierTask {
    pub fn new(
        name: &'static str,
        command: Command,
        initial_delay: Duration,
        interval: Duration,
        queue: CommandSender,
        running: RunningFlag,
    ) -> Self {
        Self {
            name,
            command,
            initial_delay,
            interval,
            queue,
            running,
        }
    }

    /// Polls the battery level
    pub fn battery(config: &BridgeConfig, queue: CommandSender, running: RunningFlag) -> Self {
        Self::new(
            "battery",
            Command::get("battery"),
            config.initial_delay,
            config.battery_interval,
            queue,
            running,
        )
    }

    /// Polls the full device state
    pub fn state(config: &BridgeConfig, queue: CommandSender, running: RunningFlag) -> Self {
        Self::new(
            "state",
            Command::get_all(),
            config.initial_delay,
            config.state_interval,
            queue,
            running,
        )
    }

    pub async fn run(mut self) -> Result<()> {
        debug!("{} notifier starting", self.name);

        let mut wait = self.initial_delay;
        loop {
            tokio::select! {
                _ = self.running.stopped() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            if self.queue.send(self.command.clone()).is_err() {
                debug!("Command queue closed, stopping {} notifier", self.name);
                break;
            }
            wait = self.interval;
        }

        debug!("{} notifier stopped", self.name);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Link Monitor
// ----------------------------------------------------------------------------

/// Re-runs the connection sequence while no device is linked
pub struct LinkMonitorTask {
    connector: Arc<Connector>,
    interval: Duration,
    running: RunningFlag,
}

impl LinkMonitorTask {
    pub fn new(connector: Arc<Connector>, interval: Duration, running: RunningFlag) -> Self {
        Self {
            connector,
            interval,
            running,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        debug!("Link monitor starting");

        loop {
            tokio::select! {
                _ = self.running.stopped() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            if self.connector.is_linked().await {
                continue;
            }

            info!("No device linked, reconnecting");
            if let Err(e) = self.connector.establish().await {
                warn!("Reconnect failed: {}", e);
            }
        }

        debug!("Link monitor stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::running_flag;
    use aquatimer_core::testing::{MockBroker, MockTimer};

    #[tokio::test]
    async fn test_producer_filters_and_parses() {
        let broker = MockBroker::new();
        let (handle, running) = running_flag();
        let (queue, mut commands) = mpsc::unbounded_channel();
        let mut config = BridgeConfig::default();
        config.topics.command = "cmd".into();
        let producer = ProducerTask::new(broker.clone(), &config, queue, running);
        let task = tokio::spawn(producer.run());

        broker.inject("other", r#"{"cmd":"get","item":"battery"}"#);
        broker.inject("cmd", "{not json");
        broker.inject("cmd", r#"{"cmd":"get","item":"status"}"#);

        let command = tokio::time::timeout(Duration::from_secs(1), commands.recv())
            .await
            .unwrap();
        assert_eq!(command, Some(Command::get("status")));
        assert_eq!(broker.subscriptions(), vec!["cmd".to_string()]);

        handle.stop();
        task.await.unwrap().unwrap();
        assert!(commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_producer_retries_failed_subscribe() {
        let broker = MockBroker::new();
        broker.fail_next_subscribe(MessageError::Other("not authorised".into()));
        let (handle, running) = running_flag();
        let (queue, mut commands) = mpsc::unbounded_channel();
        let config = BridgeConfig::default().with_reconnect_interval(Duration::from_millis(20));
        let producer = ProducerTask::new(broker.clone(), &config, queue, running);
        let task = tokio::spawn(producer.run());

        broker.inject(&config.topics.command, r#"{"cmd":"get","item":"battery"}"#);

        let command = tokio::time::timeout(Duration::from_secs(1), commands.recv())
            .await
            .unwrap();
        assert_eq!(command, Some(Command::get("battery")));
        assert_eq!(broker.subscriptions(), vec![config.topics.command.clone()]);

        handle.stop();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_producer_stops_while_waiting_to_resubscribe() {
        let broker = MockBroker::new();
        broker.fail_next_subscribe(MessageError::Closed);
        let (handle, running) = running_flag();
        let (queue, _commands) = mpsc::unbounded_channel();
        let config = BridgeConfig::default().with_reconnect_interval(Duration::from_secs(3600));
        let task = tokio::spawn(ProducerTask::new(broker.clone(), &config, queue, running).run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(broker.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_consumer_gives_up_on_stalled_publish() {
        let broker = MockBroker::new();
        let config = BridgeConfig::default()
            .with_scan_timeout(Duration::from_millis(200))
            .with_connect_timeout(Duration::from_millis(200))
            .with_io_timeout(Duration::from_millis(100));
        let connector = Arc::new(Connector::new(MockTimer::new(), config.clone()));
        connector.establish().await.unwrap();

        let (handle, running) = running_flag();
        let (queue, commands) = mpsc::unbounded_channel();
        let consumer = ConsumerTask::new(
            commands,
            queue.clone(),
            connector,
            broker.clone(),
            &config,
            running,
        );
        let task = tokio::spawn(consumer.run());

        broker.stall_publishes(true);
        queue.send(Command::get("battery")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        broker.stall_publishes(false);

        queue.send(Command::get("status")).unwrap();
        let publication = broker
            .next_publication(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(publication.topic, config.topics.info);
        assert_eq!(publication.json(), serde_json::json!({"status": 2}));

        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_notifier_enqueues_after_grace_delay() {
        let (handle, running) = running_flag();
        let (queue, mut commands) = mpsc::unbounded_channel();
        let notifier = NotifierTask::new(
            "test",
            Command::get("battery"),
            Duration::from_millis(50),
            Duration::from_millis(20),
            queue,
            running,
        );
        let task = tokio::spawn(notifier.run());

        assert!(commands.try_recv().is_err());
        for _ in 0..3 {
            let command = tokio::time::timeout(Duration::from_secs(1), commands.recv())
                .await
                .unwrap();
            assert_eq!(command, Some(Command::get("battery")));
        }

        handle.stop();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_consumer_without_device_is_noop() {
        let broker = MockBroker::new();
        let connector = Arc::new(Connector::new(MockTimer::new(), BridgeConfig::default()));
        let (handle, running) = running_flag();
        let (queue, commands) = mpsc::unbounded_channel();
        let consumer = ConsumerTask::new(
            commands,
            queue.clone(),
            connector,
            broker.clone(),
            &BridgeConfig::default(),
            running,
        );
        let task = tokio::spawn(consumer.run());

        queue.send(Command::get("battery")).unwrap();
        assert!(broker
            .next_publication(Duration::from_millis(100))
            .await
            .is_none());

        handle.stop();
        task.await.unwrap().unwrap();
    }
}
