//! Lifecycle tests of the simulation controller against the mock broker

use fleet_devkit::{fleet, ConnectBehavior, MockBroker, TestHarness};
use fleet_simulator::{
    ConnectionError, ControllerOptions, Phase, SimulationController, SimulationError, StartOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_start_before_connect_is_rejected() {
    let harness = TestHarness::new(fleet(&[1000, 2000]));

    let result = harness.controller.start().await;
    assert!(matches!(result, Err(SimulationError::NotConnected)));

    let status = harness.controller.status();
    assert!(!status.running);
    assert_eq!(status.phase, Phase::Stopped);
    assert_eq!(status.active_timers, 0);
    assert!(harness.broker.get_published_messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_start_publishes_once_per_device_immediately() {
    let harness = TestHarness::new(fleet(&[1000, 2000, 5000]));
    harness.controller.connect().await.unwrap();

    let outcome = harness.controller.start().await.unwrap();
    assert_eq!(outcome, StartOutcome::Started { devices: 3 });

    // first publish happens inside start, before any time passes
    for device in harness.controller.devices() {
        assert_eq!(harness.broker.count_for_topic(&device.topic), 1, "{}", device.id);
    }
    assert_eq!(harness.assert_all_payloads_valid().unwrap(), 3);

    harness.controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_a_no_op() {
    let harness = TestHarness::new(fleet(&[1000, 2000, 5000]));
    harness.start().await.unwrap();

    let again = harness.controller.start().await.unwrap();
    assert_eq!(again, StartOutcome::AlreadyRunning);

    let status = harness.controller.status();
    assert!(status.running);
    assert_eq!(status.active_timers, 3);
    assert_eq!(harness.broker.get_published_messages().len(), 3);

    harness.controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_starts_schedule_each_device_once() {
    let harness = TestHarness::new(fleet(&[1000, 2000]));
    harness.controller.connect().await.unwrap();

    let (a, b) = tokio::join!(harness.controller.start(), harness.controller.start());
    let outcomes = [a.unwrap(), b.unwrap()];
    assert!(outcomes.contains(&StartOutcome::Started { devices: 2 }));
    assert!(outcomes.contains(&StartOutcome::AlreadyRunning));
    assert_eq!(harness.controller.status().active_timers, 2);

    harness.controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let harness = TestHarness::new(fleet(&[1000]));

    // stop without ever starting
    harness.controller.stop().await;
    assert_eq!(harness.controller.status().phase, Phase::Stopped);

    harness.start().await.unwrap();
    harness.controller.stop().await;
    harness.controller.stop().await;

    let status = harness.controller.status();
    assert!(!status.running);
    assert_eq!(status.active_timers, 0);
    // stop leaves the connection open
    assert!(status.connected);
}

#[tokio::test(start_paused = true)]
async fn test_no_publish_after_stop_returns() {
    let harness = TestHarness::new(fleet(&[100, 250, 400]));
    harness.start().await.unwrap();

    sleep(Duration::from_millis(1_000)).await;
    harness.controller.stop().await;
    let published = harness.broker.get_published_messages().len();

    sleep(Duration::from_secs(10)).await;
    assert_eq!(harness.broker.get_published_messages().len(), published);
    assert_eq!(harness.controller.status().messages_published, published as u64);
}

#[tokio::test(start_paused = true)]
async fn test_restart_cycles_release_device_tasks() {
    let harness = TestHarness::new(fleet(&[500, 700, 900]));
    harness.controller.connect().await.unwrap();

    for _ in 0..5 {
        harness.controller.start().await.unwrap();
        // one clone per running device task
        assert_eq!(Arc::strong_count(harness.controller.channel()), 4);
        sleep(Duration::from_millis(1_200)).await;

        harness.controller.stop().await;
        assert_eq!(Arc::strong_count(harness.controller.channel()), 1);
        assert_eq!(harness.controller.status().active_timers, 0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_and_closes() {
    let harness = TestHarness::new(fleet(&[1000, 2000]));
    harness.start().await.unwrap();

    harness.controller.disconnect().await;

    let status = harness.controller.status();
    assert!(!status.running);
    assert!(!status.connected);
    assert_eq!(status.active_timers, 0);

    // a second disconnect is harmless
    harness.controller.disconnect().await;

    assert!(matches!(
        harness.controller.start().await,
        Err(SimulationError::NotConnected)
    ));

    // reconnecting brings the fleet back
    harness.start().await.unwrap();
    assert!(harness.controller.status().running);
    assert_eq!(harness.broker.connect_attempts(), 2);
    harness.controller.disconnect().await;
}

#[tokio::test]
async fn test_refused_connection_surfaces_and_blocks_start() {
    let broker = MockBroker::new().with_connect_behavior(ConnectBehavior::Refuse("not authorized".into()));
    let harness = TestHarness::with_broker(fleet(&[1000]), broker);

    let err = harness.controller.connect().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Refused(ref reason) if reason == "not authorized"));
    assert!(matches!(
        harness.controller.start().await,
        Err(SimulationError::NotConnected)
    ));
    assert!(!harness.controller.status().connected);
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_connection_times_out() {
    let broker = MockBroker::new().with_connect_behavior(ConnectBehavior::NeverAck(Duration::from_secs(5)));
    let controller = SimulationController::new(fleet(&[1000]), broker.clone(), ControllerOptions::default());

    let err = controller.connect().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Timeout(d) if d == Duration::from_secs(5)));
    assert_eq!(broker.connect_attempts(), 1);
    assert!(controller.start().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_controller_stops_its_devices() {
    let broker = MockBroker::new();
    {
        let controller = SimulationController::new(fleet(&[1000]), broker.clone(), ControllerOptions::default());
        controller.connect().await.unwrap();
        controller.start().await.unwrap();
        assert_eq!(controller.channel().transport().connect_attempts(), 1);
    }
    assert_eq!(broker.get_published_messages().len(), 1);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(broker.get_published_messages().len(), 1);
}
