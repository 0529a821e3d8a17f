//! Integration tests for the synthetic trainer cadence.

use std::time::Duration;

use ghostride::sensors::channel::{telemetry_queue, TrainerChannel};
use ghostride::sensors::synthetic::{SyntheticTrainer, SyntheticValues};
use ghostride::sensors::types::ConnectionStatus;

fn values(power_w: i16) -> SyntheticValues {
    SyntheticValues {
        power_w: Some(power_w),
        speed_kmh: Some(30.0),
        cadence_rpm: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_emits_immediately_then_every_interval() {
    let mut trainer = SyntheticTrainer::new(values(180), Duration::from_secs(1));
    let frames = telemetry_queue(&mut trainer);

    trainer.connect().await.unwrap();
    assert_eq!(trainer.status(), ConnectionStatus::Connected);

    // Frames at 0s, 1s and 2s
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let received: Vec<_> = frames.try_iter().collect();
    assert_eq!(received.len(), 3);

    let frame = received[0];
    assert_eq!(frame.power_w, Some(180));
    assert_eq!(frame.speed_kmh, Some(30.0));
    assert!(frame.cadence_rpm.is_none());

    trainer.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_setters_change_following_frames() {
    let mut trainer = SyntheticTrainer::new(values(150), Duration::from_millis(500));
    let controls = trainer.controls();
    let frames = telemetry_queue(&mut trainer);

    trainer.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    controls.set_power(320);
    controls.set_cadence(95.0);
    tokio::time::sleep(Duration::from_millis(500)).await;

    let received: Vec<_> = frames.try_iter().collect();
    assert_eq!(received.first().unwrap().power_w, Some(150));
    let last = received.last().unwrap();
    assert_eq!(last.power_w, Some(320));
    assert_eq!(last.cadence_rpm, Some(95.0));

    trainer.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_frames() {
    let mut trainer = SyntheticTrainer::new(values(200), Duration::from_secs(1));
    let frames = telemetry_queue(&mut trainer);

    trainer.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    trainer.disconnect().await;
    trainer.disconnect().await;
    assert!(!trainer.is_connected());

    let before = frames.try_iter().count();
    assert_eq!(before, 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(frames.try_iter().count(), 0);
}

#[tokio::test]
async fn test_resistance_control_is_a_no_op() {
    let trainer = SyntheticTrainer::default();
    let control = trainer.resistance_control().expect("synthetic accepts params");
    control.set_simulation_params(0.1, 0.004, 0.2).await.unwrap();
    assert!(trainer.debug_log().is_none());
}
