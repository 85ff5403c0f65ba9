use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use telemetry_store::{
    BroadcastHub, BroadcastSampler, Coordinator, NewReading, Payload, SENSOR_TYPES,
    SensorSimulator, TelemetryConfig, TelemetryStore,
};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn test_simulator_feeds_store_until_shutdown() {
    let store = Arc::new(TelemetryStore::new());
    let mut coordinator = Coordinator::new(store.clone());
    coordinator
        .start_simulator(SensorSimulator::with_seed(7).with_batch(10, Duration::from_millis(2)))
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || store.get_total_readings_count() >= 50));
    coordinator.shutdown();

    let settled = store.get_total_readings_count();
    assert_eq!(settled % 10, 0);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(store.get_total_readings_count(), settled);

    for sensor_type in store.sensor_types() {
        assert!(SENSOR_TYPES.contains(&sensor_type.as_str()));
    }
}

#[test]
fn test_broadcaster_publishes_selected_batch() {
    let config = TelemetryConfig::default().with_broadcast_probabilities(1.0, 1.0);
    let store = Arc::new(TelemetryStore::try_new(config).unwrap());
    let hub = Arc::new(BroadcastHub::new());
    let subscriber = hub.subscribe(1024);

    let mut coordinator = Coordinator::new(store.clone());
    let ingestor = coordinator
        .start_broadcaster(BroadcastSampler::with_seed(store.clone(), hub.clone(), 1), 64)
        .unwrap();

    let batch: Vec<NewReading> = (0..3)
        .map(|i| NewReading::new(format!("SENSOR_{i:03}"), 20.0 + i as f64, "Temperature"))
        .collect();
    assert_eq!(ingestor.ingest(batch), 3);

    let mut kinds = Vec::new();
    while kinds.len() < 2 {
        match subscriber.recv_timeout(Duration::from_secs(5)) {
            Ok(payload) => kinds.push(payload.kind()),
            Err(e) => panic!("broadcast not received: {e}"),
        }
    }
    coordinator.shutdown();

    // No alerts yet, so nothing follows the stats.
    assert_eq!(kinds, vec!["reading", "stats"]);
    assert!(subscriber.try_recv().is_err());
    assert_eq!(store.get_total_readings_count(), 3);
}

#[test]
fn test_broadcaster_stays_quiet_at_zero_probability() {
    let config = TelemetryConfig::default().with_broadcast_probabilities(0.0, 1.0);
    let store = Arc::new(TelemetryStore::try_new(config).unwrap());
    let hub = Arc::new(BroadcastHub::new());
    let subscriber = hub.subscribe(16);

    let mut coordinator = Coordinator::new(store.clone());
    let ingestor = coordinator
        .start_broadcaster(BroadcastSampler::with_seed(store.clone(), hub.clone(), 1), 64)
        .unwrap();
    for _ in 0..20 {
        ingestor.ingest(vec![NewReading::new("SENSOR_001", 1.0, "Humidity")]);
    }
    thread::sleep(Duration::from_millis(100));
    coordinator.shutdown();

    assert!(subscriber.try_recv().is_err());
    assert_eq!(store.get_total_readings_count(), 20);
}

#[test]
fn test_shutdown_is_idempotent_and_drop_is_clean() {
    let store = Arc::new(TelemetryStore::new());
    let mut coordinator = Coordinator::new(store);
    coordinator.start_sweeper().unwrap();
    assert!(!coordinator.has_worker_exited_early());

    coordinator.shutdown();
    coordinator.shutdown();
    assert!(coordinator.shutdown_signal().is_triggered());
    drop(coordinator);
}

#[test]
fn test_payload_kinds_serialize_as_tagged_json() {
    let store = TelemetryStore::new();
    let reading = store.add_reading(NewReading::new("SENSOR_001", 1.5, "Pressure"));
    let json = serde_json::to_value(Payload::Reading(reading)).unwrap();
    assert_eq!(json["kind"], "reading");
    assert_eq!(json["data"]["sensorId"], "SENSOR_001");
    assert_eq!(json["data"]["sensorType"], "Pressure");
}
