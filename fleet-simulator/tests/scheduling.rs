//! Per-device scheduling and failure isolation over simulated time

use fleet_devkit::{fleet, TestHarness};
use fleet_simulator::TelemetryMessage;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_devices_tick_on_their_own_intervals() {
    let harness = TestHarness::new(fleet(&[1000, 2000, 5000]));
    harness.start().await.unwrap();

    sleep(Duration::from_millis(5_500)).await;
    harness.controller.stop().await;

    assert_eq!(harness.published_by("dev-1").unwrap(), 6);
    assert_eq!(harness.published_by("dev-2").unwrap(), 3);
    assert_eq!(harness.published_by("dev-3").unwrap(), 2);
    harness.assert_all_payloads_valid().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_failing_device_does_not_stall_the_others() {
    let mut harness = TestHarness::new(fleet(&[1000, 2000, 5000]));
    harness.start().await.unwrap();

    // device 2 starts failing just before its 2000ms tick
    sleep(Duration::from_millis(1_500)).await;
    let failing = harness.device("dev-2").unwrap().topic;
    harness.broker.fail_topic(&failing);

    sleep(Duration::from_millis(4_000)).await;

    let dev1 = harness.device("dev-1").unwrap().topic;
    let dev3 = harness.device("dev-3").unwrap().topic;
    harness.expect_messages(&dev1, 6).expect_messages(&dev3, 2);
    harness.verify_expectations().unwrap();

    // only the publish issued at start got through
    assert_eq!(harness.broker.count_for_topic(&failing), 1);
    assert_eq!(harness.broker.rejected_count(), 2);

    let status = harness.controller.status();
    assert!(status.running);
    assert_eq!(status.active_timers, 3);
    assert_eq!(status.messages_published, 9);
    assert_eq!(status.publish_failures, 2);

    // the device resumes once the broker accepts it again
    harness.broker.heal_topic(&failing);
    sleep(Duration::from_millis(2_000)).await;
    assert_eq!(harness.broker.count_for_topic(&failing), 2);

    harness.controller.stop().await;
    harness.get_stats().print();
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_is_absorbed() {
    let harness = TestHarness::new(fleet(&[1000, 1000]));
    harness.start().await.unwrap();

    harness.broker.drop_connection();
    sleep(Duration::from_millis(3_500)).await;

    let status = harness.controller.status();
    assert!(status.running);
    assert!(!status.connected);
    assert_eq!(status.messages_published, 2);
    assert_eq!(status.publish_failures, 6);

    harness.broker.restore_connection();
    sleep(Duration::from_millis(1_000)).await;
    assert_eq!(harness.controller.status().messages_published, 4);

    harness.controller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_payload_identifies_its_device() {
    let harness = TestHarness::new(fleet(&[1000, 1500, 2000, 2500, 3000, 3500]));
    harness.start().await.unwrap();
    sleep(Duration::from_millis(4_000)).await;
    harness.controller.stop().await;

    for device in harness.controller.devices() {
        let last: TelemetryMessage = harness
            .broker
            .get_last_json_message(&device.topic)
            .unwrap()
            .expect("device published");
        assert_eq!(last.device_id, device.id);
    }
    assert!(harness.assert_all_payloads_valid().unwrap() >= 6);
}

#[tokio::test(start_paused = true)]
async fn test_same_seed_same_readings() {
    // solar output follows the wall clock, so keep to clock-free device types
    let intervals = [1000, 2000];
    let first = TestHarness::new(fleet(&intervals));
    let second = TestHarness::new(fleet(&intervals));

    first.start().await.unwrap();
    second.start().await.unwrap();
    sleep(Duration::from_millis(4_500)).await;
    first.controller.stop().await;
    second.controller.stop().await;

    for device in first.controller.devices() {
        let a = first.broker.find_messages_by_topic(&device.topic);
        let b = second.broker.find_messages_by_topic(&device.topic);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            let x: TelemetryMessage = serde_json::from_slice(&x.payload).unwrap();
            let y: TelemetryMessage = serde_json::from_slice(&y.payload).unwrap();
            assert_eq!(x.metrics, y.metrics);
        }
    }
}
