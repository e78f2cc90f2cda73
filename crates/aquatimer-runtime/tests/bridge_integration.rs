//! End-to-end tests driving the supervisor against in-memory transports

use std::sync::Arc;
use std::time::Duration;

use aquatimer_core::testing::{characteristic_of, DeviceCall, MockBroker, MockTimer, Publication};
use aquatimer_runtime::{BridgeConfig, BridgeHandle, LinkState, Supervisor};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_test::assert_ok;

const COMMAND: &str = "$SYS/broker/aquatimer/command";
const INFO: &str = "$SYS/broker/aquatimer/info";
const BATTERY: &str = "$SYS/broker/aquatimer/battery";

const WAIT: Duration = Duration::from_secs(2);

struct Bridge {
    timer: Arc<MockTimer>,
    broker: Arc<MockBroker>,
    handle: BridgeHandle,
    state: watch::Receiver<LinkState>,
    task: JoinHandle<aquatimer_runtime::Result<()>>,
}

impl Bridge {
    /// Start a bridge whose notifiers stay quiet unless the config says otherwise
    fn start(timer: Arc<MockTimer>, config: BridgeConfig) -> Self {
        let broker = MockBroker::new();
        let supervisor = Supervisor::new(config, timer.clone(), broker.clone());
        let handle = supervisor.handle();
        let state = supervisor.state();
        let task = tokio::spawn(supervisor.run());
        Self {
            timer,
            broker,
            handle,
            state,
            task,
        }
    }

    fn command(&self, payload: &str) {
        self.broker.inject(COMMAND, payload);
    }

    async fn expect_on(&self, topic: &str) -> Publication {
        self.broker
            .next_publication_on(topic, WAIT)
            .await
            .unwrap_or_else(|| panic!("nothing published on {}", topic))
    }

    async fn wait_for_state(&mut self, accept: impl Fn(&LinkState) -> bool) {
        let state = &mut self.state;
        tokio::time::timeout(WAIT, async {
            loop {
                if accept(&*state.borrow_and_update()) {
                    return;
                }
                state.changed().await.unwrap();
            }
        })
        .await
        .expect("link state not reached");
    }

    async fn stop(self) -> (Arc<MockTimer>, Arc<MockBroker>) {
        self.handle.stop();
        let result = tokio::time::timeout(WAIT, self.task)
            .await
            .expect("bridge did not stop")
            .unwrap();
        assert_ok!(result);
        (self.timer, self.broker)
    }
}

fn quiet_config() -> BridgeConfig {
    BridgeConfig::default()
        .with_initial_delay(Duration::from_secs(3600))
        .with_scan_timeout(Duration::from_millis(200))
        .with_connect_timeout(Duration::from_millis(200))
        .with_io_timeout(Duration::from_millis(500))
        .with_reconnect_interval(Duration::from_millis(50))
}

#[tokio::test]
async fn test_get_battery_uses_override_topic() {
    let mut bridge = Bridge::start(MockTimer::new(), quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command(r#"{"cmd": "get", "item": "battery"}"#);
    let publication = bridge.expect_on(BATTERY).await;
    assert_eq!(publication.json(), json!({"battery": 80}));

    bridge.command(r#"{"cmd": "get", "item": "status"}"#);
    let publication = bridge.expect_on(INFO).await;
    assert_eq!(publication.json(), json!({"status": 2}));

    bridge.stop().await;
}

#[tokio::test]
async fn test_get_all_publishes_derived_snapshot() {
    let mut bridge = Bridge::start(MockTimer::new(), quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command(r#"{"cmd": "get", "item": "all"}"#);
    let snapshot = bridge.expect_on(INFO).await.json();

    assert_eq!(snapshot["on"], json!(true));
    assert_eq!(snapshot["manual_time_left"], json!(10));
    assert_eq!(snapshot["time"], json!([21, 23, 4]));
    assert_eq!(snapshot["cycle_duration"], json!(29));
    assert_eq!(snapshot.as_object().map(|o| o.len()), Some(10));

    bridge.stop().await;
}

#[tokio::test]
async fn test_set_rain_delay_publishes_fresh_snapshot() {
    let mut bridge = Bridge::start(MockTimer::new(), quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command(r#"{"cmd": "set", "item": "rain_delay_time", "value": 0}"#);
    let snapshot = bridge.expect_on(INFO).await.json();

    assert_eq!(snapshot["rain_delay_time"], json!(0));
    assert_eq!(
        bridge.timer.frame("rain_delay_time"),
        Some(vec![0x66, 0x01, 0x00])
    );

    bridge.stop().await;
}

#[tokio::test]
async fn test_set_cycle_duration_then_get_all() {
    let mut bridge = Bridge::start(MockTimer::new(), quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command(r#"{"cmd": "set", "item": "cycle_duration", "value": 15}"#);
    let refreshed = bridge.expect_on(INFO).await.json();
    assert_eq!(refreshed["cycle_duration"], json!(15));

    bridge.command(r#"{"cmd": "get", "item": "all"}"#);
    let snapshot = bridge.expect_on(INFO).await.json();
    assert_eq!(snapshot["cycle_duration"], json!(15));

    bridge.stop().await;
}

#[tokio::test]
async fn test_writes_are_serialized_with_reads() {
    let timer = MockTimer::new();
    timer.set_write_delay(Duration::from_millis(150));
    let mut bridge = Bridge::start(timer, quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command(r#"{"cmd": "set", "item": "status", "value": 1}"#);
    bridge.command(r#"{"cmd": "get", "item": "battery"}"#);

    bridge.expect_on(BATTERY).await;
    let snapshot = bridge.expect_on(INFO).await.json();
    assert_eq!(snapshot["status"], json!(1));

    let (timer, _) = bridge.stop().await;
    let calls = timer.calls();
    let status = characteristic_of("status");
    let started = calls
        .iter()
        .position(|call| matches!(call, DeviceCall::WriteStarted { uuid, .. } if *uuid == status))
        .unwrap();
    assert_eq!(
        calls[started + 1],
        DeviceCall::WriteFinished { uuid: status }
    );
    assert!(calls[..started]
        .iter()
        .all(|call| !matches!(call, DeviceCall::Read { .. })));
}

#[tokio::test]
async fn test_bad_input_does_not_stop_the_bridge() {
    let mut bridge = Bridge::start(MockTimer::new(), quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command("{not json");
    bridge.command(r#"{"cmd": "set", "item": "status", "value": 300}"#);
    bridge.command(r#"{"cmd": "get", "item": "sprinkler"}"#);
    bridge.command(r#"{"cmd": "set", "item": "battery", "value": 100}"#);
    bridge.command(r#"{"cmd": "set", "item": "time", "value": 12}"#);
    bridge.broker.inject(INFO, r#"{"cmd": "get", "item": "battery"}"#);
    bridge.command(r#"{"cmd": "get", "item": "battery"}"#);

    let publication = bridge.expect_on(BATTERY).await;
    assert_eq!(publication.json(), json!({"battery": 80}));

    let (timer, broker) = bridge.stop().await;
    assert!(timer.writes().is_empty());
    assert_eq!(broker.published().len(), 1);
}

#[tokio::test]
async fn test_notifiers_poll_battery_and_state() {
    let config = quiet_config()
        .with_initial_delay(Duration::from_millis(20))
        .with_battery_interval(Duration::from_millis(50))
        .with_state_interval(Duration::from_millis(50));
    let bridge = Bridge::start(MockTimer::new(), config);

    let battery = bridge.expect_on(BATTERY).await;
    assert_eq!(battery.json(), json!({"battery": 80}));
    let second = bridge.expect_on(BATTERY).await;
    assert_eq!(second.json(), json!({"battery": 80}));
    let state = bridge.expect_on(INFO).await;
    assert_eq!(state.json()["status"], json!(2));

    bridge.stop().await;
}

#[tokio::test]
async fn test_degraded_start_then_reconnect() {
    let timer = MockTimer::new();
    timer.set_advertising(false);
    let mut bridge = Bridge::start(timer, quiet_config());

    bridge
        .wait_for_state(|state| {
            matches!(
                state,
                LinkState::Disconnected(Some(aquatimer_core::ConnectError::DeviceNotFound { .. }))
            )
        })
        .await;

    bridge.command(r#"{"cmd": "get", "item": "battery"}"#);
    assert!(bridge
        .broker
        .next_publication(Duration::from_millis(100))
        .await
        .is_none());

    bridge.timer.set_advertising(true);
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command(r#"{"cmd": "get", "item": "battery"}"#);
    bridge.expect_on(BATTERY).await;

    bridge.stop().await;
}

#[tokio::test]
async fn test_lost_link_is_reestablished() {
    let mut bridge = Bridge::start(MockTimer::new(), quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.timer.drop_link();
    bridge.command(r#"{"cmd": "get", "item": "status"}"#);

    let timer = bridge.timer.clone();
    tokio::time::timeout(WAIT, async {
        while timer
            .calls()
            .iter()
            .filter(|call| **call == DeviceCall::Connect)
            .count()
            < 2
            || !timer.is_connected()
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("link not re-established");
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command(r#"{"cmd": "get", "item": "status"}"#);
    let publication = bridge.expect_on(INFO).await;
    assert_eq!(publication.json(), json!({"status": 2}));

    bridge.stop().await;
}

#[tokio::test]
async fn test_shutdown_releases_both_transports() {
    let mut bridge = Bridge::start(MockTimer::new(), quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;
    let state = bridge.state.clone();

    let (timer, broker) = bridge.stop().await;

    assert_eq!(timer.calls().last(), Some(&DeviceCall::Disconnect));
    assert!(!timer.is_connected());
    assert!(broker.is_disconnected());
    assert_eq!(broker.subscriptions(), vec![COMMAND.to_string()]);
    assert_eq!(*state.borrow(), LinkState::Stopped);
}

#[tokio::test]
async fn test_consumer_continues_after_publish_failure() {
    let mut bridge = Bridge::start(MockTimer::new(), quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge
        .broker
        .fail_next_publish(aquatimer_core::MessageError::Publish {
            topic: BATTERY.into(),
            reason: "broker unavailable".into(),
        });
    bridge.command(r#"{"cmd": "get", "item": "battery"}"#);
    bridge.command(r#"{"cmd": "set", "item": "status", "value": 1}"#);

    let snapshot = bridge.expect_on(INFO).await.json();
    assert_eq!(snapshot["status"], json!(1));

    let (timer, broker) = bridge.stop().await;
    assert!(timer.calls().contains(&DeviceCall::Read {
        uuid: characteristic_of("battery")
    }));
    assert_eq!(timer.frame("status"), Some(vec![0x61, 0x01, 0x01]));
    assert!(broker.published().iter().all(|p| p.topic != BATTERY));
}

#[tokio::test]
async fn test_stalled_broker_does_not_block_commands_or_shutdown() {
    let mut bridge = Bridge::start(MockTimer::new(), quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.broker.stall_publishes(true);
    bridge.command(r#"{"cmd": "get", "item": "battery"}"#);
    bridge.command(r#"{"cmd": "set", "item": "rain_delay_time", "value": 7}"#);

    // the write behind the stalled publish still reaches the device
    let timer = bridge.timer.clone();
    tokio::time::timeout(WAIT, async {
        while timer.frame("rain_delay_time") != Some(vec![0x66, 0x01, 0x07]) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("write never reached the device");

    let (timer, broker) = bridge.stop().await;
    assert_eq!(timer.calls().last(), Some(&DeviceCall::Disconnect));
    assert!(broker.is_disconnected());
    assert!(broker.published().is_empty());
}

#[tokio::test]
async fn test_unexpected_constant_fails_strict_snapshot_only() {
    let timer = MockTimer::new();
    timer.set_frame("cycle_frequency", vec![0x63, 0x03, 0x00, 0x04, 0x3e]);
    let mut bridge = Bridge::start(timer, quiet_config());
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command(r#"{"cmd": "get", "item": "all"}"#);
    bridge.command(r#"{"cmd": "get", "item": "battery"}"#);
    bridge.expect_on(BATTERY).await;
    let (timer, broker) = bridge.stop().await;
    assert!(broker.published().iter().all(|p| p.topic != INFO));

    let mut bridge = Bridge::start(timer, quiet_config().with_strict_literals(false));
    bridge.wait_for_state(LinkState::is_ready).await;

    bridge.command(r#"{"cmd": "get", "item": "all"}"#);
    let snapshot = bridge.expect_on(INFO).await.json();
    assert_eq!(snapshot["cycle_frequency"], json!(4));

    bridge.stop().await;
}
