//! End-to-end session tests against a scripted BLE transport.

use std::sync::Arc;
use std::time::Duration;

use spinzone::sensors::SensorError;
use spinzone::session::{
    LoopStatus, Session, SessionError, SessionOutcome, SessionTiming,
};
use spinzone::storage::config::{DeviceNames, UserProfile};
use spinzone::storage::TrainingStore;
use spinzone::ui::DashboardSnapshot;
use tokio::time::Instant;

use super::sensor_mock::{
    MemorySink, MockBle, MockPeripheral, MockSensorData, RecordingDashboard, SlowSink,
};

const BIKE: &str = "IC Bike";
const HRM: &str = "HRM Pro";

type TestSession = Session<MockBle, MemorySink, RecordingDashboard>;

fn devices() -> DeviceNames {
    DeviceNames {
        bike: BIKE.to_string(),
        hrm: HRM.to_string(),
    }
}

fn rider() -> UserProfile {
    UserProfile {
        name: "Sam".to_string(),
        age: 30,
        ftp: 200,
    }
}

fn bike_payload(cadence_rpm: i16, power: i16) -> Vec<u8> {
    MockSensorData {
        cadence: cadence_rpm * 2,
        power,
        ..Default::default()
    }
    .indoor_bike_data()
}

fn heart_payload(bpm: u8) -> Vec<u8> {
    MockSensorData {
        heart_rate: bpm,
        ..Default::default()
    }
    .heart_rate()
}

fn new_session(ble: &Arc<MockBle>) -> TestSession {
    Session::new(
        Arc::clone(ble),
        &devices(),
        &rider(),
        MemorySink::default(),
        RecordingDashboard::default(),
        SessionTiming::default(),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_timed_workout_records_points_and_stops() {
    let ble = Arc::new(
        MockBle::new()
            .with_device(
                BIKE,
                MockPeripheral::new("BIKE-01").with_payloads(vec![
                    bike_payload(80, 150),
                    bike_payload(85, 200),
                    bike_payload(90, 260),
                ]),
            )
            .with_device(
                HRM,
                MockPeripheral::new("HRM-01")
                    .with_payloads(vec![heart_payload(120), heart_payload(150)]),
            ),
    );
    let mut session = new_session(&ble);
    let started = Instant::now();

    let outcome = session
        .start_workout(Some(Duration::from_secs(10)))
        .await
        .unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10));
    assert!(elapsed <= Duration::from_secs(11));
    assert!(session.state().is_stopped());

    assert_eq!(session.sink().measurements("indoor_bike_data").len(), 3);
    assert_eq!(session.sink().measurements("heart_rate_monitor").len(), 2);

    let dashboard = session.dashboard();
    assert!(dashboard.closed);
    let Some(DashboardSnapshot::Workout(view)) = dashboard.frames.last() else {
        panic!("expected a workout frame");
    };
    assert_eq!(view.cadence, 90);
    assert_eq!(view.power, 260);
    assert_eq!(view.heart_rate, 150);
    // Empty training store: nothing to predict from
    assert_eq!(view.resistance, 0);

    assert_eq!(ble.connected.lock().unwrap().len(), 2);
    assert_eq!(ble.unsubscribed.lock().unwrap().len(), 2);
    assert_eq!(ble.disconnected.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_training_session_saves_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("training.json");
    let ble = Arc::new(
        MockBle::new()
            .with_device(
                BIKE,
                MockPeripheral::new("BIKE-01").with_payloads(vec![
                    bike_payload(85, 180),
                    bike_payload(85, 184),
                    bike_payload(85, 188),
                    bike_payload(85, 192),
                ]),
            )
            .with_device(
                HRM,
                MockPeripheral::new("HRM-01").with_payloads(vec![heart_payload(130)]),
            ),
    );
    let mut session = new_session(&ble).with_training_store(TrainingStore::new(), path.clone());
    let state = session.state().clone();

    let stopper = async {
        tokio::time::sleep(Duration::from_secs(6)).await;
        state.stop();
    };
    let (outcome, ()) = tokio::join!(session.start_training(25), stopper);

    assert_eq!(outcome.unwrap(), SessionOutcome::Completed);

    let saved = TrainingStore::load(&path).unwrap();
    assert_eq!(saved.samples(25, 85).len(), 4);
    assert_eq!(saved.total_samples(), 4);

    // Training never writes points, heart rate included
    assert!(session.sink().points.lock().unwrap().is_empty());

    let Some(DashboardSnapshot::Training(view)) = session.dashboard().frames.last() else {
        panic!("expected a training frame");
    };
    assert_eq!(view.resistance, 25);
    assert_eq!(view.cadence, 85);
    assert_eq!(view.count(85), 4);
}

#[tokio::test(start_paused = true)]
async fn test_missing_device_fails_after_five_attempts() {
    let ble = Arc::new(
        MockBle::new()
            .with_device(BIKE, MockPeripheral::new("BIKE-01"))
            .with_device(
                HRM,
                MockPeripheral {
                    hidden: true,
                    ..MockPeripheral::new("HRM-01")
                },
            ),
    );
    let mut session = new_session(&ble);

    let err = session.start_workout(None).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Discovery(SensorError::DeviceNotFound { attempts: 5, .. })
    ));
    assert_eq!(ble.discover_calls(BIKE), 1);
    assert_eq!(ble.discover_calls(HRM), 5);
    assert!(ble.connected.lock().unwrap().is_empty());
    assert!(session.dashboard().frames.is_empty());
    assert!(session.state().is_stopped());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_discovery_cancels_session() {
    let ble = Arc::new(
        MockBle::new()
            .with_device(
                BIKE,
                MockPeripheral {
                    misses: 10,
                    scan_time: Duration::from_secs(5),
                    ..MockPeripheral::new("BIKE-01")
                },
            )
            .with_device(HRM, MockPeripheral::new("HRM-01")),
    );
    let mut session = new_session(&ble);
    let state = session.state().clone();

    let stopper = async {
        tokio::time::sleep(Duration::from_secs(7)).await;
        state.stop();
    };
    let (outcome, ()) = tokio::join!(session.start_workout(None), stopper);

    assert_eq!(outcome.unwrap(), SessionOutcome::Cancelled);
    // Second scan was in flight when the stop arrived; no third one starts
    assert_eq!(ble.discover_calls(BIKE), 2);
    assert_eq!(ble.discover_calls(HRM), 0);
    assert!(session.dashboard().frames.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_last_discovery_attempt_cancels_session() {
    let ble = Arc::new(
        MockBle::new()
            .with_device(
                BIKE,
                MockPeripheral {
                    hidden: true,
                    scan_time: Duration::from_secs(5),
                    ..MockPeripheral::new("BIKE-01")
                },
            )
            .with_device(HRM, MockPeripheral::new("HRM-01")),
    );
    let mut session = new_session(&ble);
    let state = session.state().clone();

    // Fifth scan runs from 20 s to 25 s
    let stopper = async {
        tokio::time::sleep(Duration::from_secs(22)).await;
        state.stop();
    };
    let (outcome, ()) = tokio::join!(session.start_workout(None), stopper);

    assert_eq!(outcome.unwrap(), SessionOutcome::Cancelled);
    assert_eq!(ble.discover_calls(BIKE), 5);
    assert_eq!(ble.discover_calls(HRM), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_sink_does_not_hold_up_polling_or_stop() {
    let ble = Arc::new(
        MockBle::new()
            .with_device(
                BIKE,
                MockPeripheral {
                    interval: Duration::from_millis(250),
                    ..MockPeripheral::new("BIKE-01")
                        .with_payloads((0..40).map(|i| bike_payload(60 + i, 200)).collect())
                },
            )
            .with_device(
                HRM,
                MockPeripheral::new("HRM-01").with_payloads(vec![heart_payload(140)]),
            ),
    );
    let mut session = Session::new(
        Arc::clone(&ble),
        &devices(),
        &rider(),
        SlowSink::new(Duration::from_secs(2)),
        RecordingDashboard::default(),
        SessionTiming::default(),
    )
    .unwrap();
    let state = session.state().clone();
    let stopped_at = Duration::from_millis(3300);
    let started = Instant::now();

    let stopper = async {
        tokio::time::sleep(stopped_at).await;
        state.stop();
    };
    let (outcome, ()) = tokio::join!(session.start_workout(None), stopper);

    assert_eq!(outcome.unwrap(), SessionOutcome::Completed);
    assert!(started.elapsed() <= stopped_at + Duration::from_secs(1));

    // Thirteen payloads arrive by 3.25 s; the display saw every one of them
    let Some(DashboardSnapshot::Workout(view)) = session.dashboard().frames.last() else {
        panic!("expected a workout frame");
    };
    assert!(view.cadence >= 72);

    // At most two writes fit in the 2 s write time before the stop
    assert!(*session.sink().attempts.lock().unwrap() <= 2);
    assert_eq!(ble.disconnected.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_leaves_other_device_running() {
    let ble = Arc::new(
        MockBle::new()
            .with_device(
                BIKE,
                MockPeripheral {
                    fail_connect: true,
                    ..MockPeripheral::new("BIKE-01")
                },
            )
            .with_device(
                HRM,
                MockPeripheral::new("HRM-01").with_payloads(vec![heart_payload(140)]),
            ),
    );
    let mut session = new_session(&ble);

    let outcome = session
        .start_workout(Some(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(outcome, SessionOutcome::Completed);
    assert!(session.sink().measurements("indoor_bike_data").is_empty());
    assert_eq!(session.sink().measurements("heart_rate_monitor").len(), 1);
    assert_eq!(*ble.connected.lock().unwrap(), vec!["HRM-01".to_string()]);
    assert_eq!(session.bike().status(), LoopStatus::Inactive);
    assert!(session.dashboard().closed);
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_every_task_within_a_tick() {
    let ble = Arc::new(
        MockBle::new()
            .with_device(
                BIKE,
                MockPeripheral::new("BIKE-01").with_payloads(vec![bike_payload(88, 210)]),
            )
            .with_device(
                HRM,
                MockPeripheral::new("HRM-01").with_payloads(vec![heart_payload(135)]),
            ),
    );
    let mut session = new_session(&ble);
    let state = session.state().clone();
    let stopped_at = Duration::from_millis(3300);
    let started = Instant::now();

    let stopper = async {
        tokio::time::sleep(stopped_at).await;
        state.stop();
    };
    let (outcome, ()) = tokio::join!(session.start_workout(None), stopper);

    assert_eq!(outcome.unwrap(), SessionOutcome::Completed);
    assert!(started.elapsed() <= stopped_at + Duration::from_secs(1));
    assert!(session.state().is_stopped());
    assert!(session.dashboard().closed);
    assert_eq!(ble.disconnected.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_resistance_is_rejected_before_discovery() {
    let ble = Arc::new(
        MockBle::new()
            .with_device(BIKE, MockPeripheral::new("BIKE-01"))
            .with_device(HRM, MockPeripheral::new("HRM-01")),
    );
    let mut session = new_session(&ble);

    let err = session.start_training(100).await.unwrap_err();

    assert!(matches!(err, SessionError::InvalidResistance(100)));
    assert_eq!(ble.discover_calls(BIKE), 0);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let ble = Arc::new(MockBle::new());

    let no_ftp = Session::new(
        Arc::clone(&ble),
        &devices(),
        &UserProfile {
            ftp: 0,
            ..rider()
        },
        MemorySink::default(),
        RecordingDashboard::default(),
        SessionTiming::default(),
    );
    assert!(matches!(no_ftp, Err(SessionError::Config(_))));

    let no_bike = Session::new(
        Arc::clone(&ble),
        &DeviceNames {
            bike: "  ".to_string(),
            hrm: HRM.to_string(),
        },
        &rider(),
        MemorySink::default(),
        RecordingDashboard::default(),
        SessionTiming::default(),
    );
    assert!(matches!(no_bike, Err(SessionError::Config(_))));
}
