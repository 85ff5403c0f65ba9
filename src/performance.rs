use crate::config::{DEFAULT_RECENT_ALERTS, DEFAULT_STATS_WINDOW};
use crate::counters::CounterSnapshot;
use crate::measure::{LatencyMeasurer, LatencyStats};
use crate::model::{NewReading, WindowStats};
use crate::store::TelemetryStore;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use spdlog::info;
use std::thread;
use std::time::{Duration, Instant};

const LOAD_TEST_ROUND: usize = 100;
const LOAD_TEST_SENSORS: usize = 10;
const LOAD_TEST_PAUSE: Duration = Duration::from_millis(1);
const METRICS_RETRIEVAL_COUNT: usize = 10_000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestReport {
    pub test_duration_seconds: f64,
    pub readings_added: usize,
    pub readings_per_second: f64,
    pub total_readings_in_system: usize,
    pub ingest_latency: LatencyStats,
    pub test_completed: DateTime<Utc>,
}

/// Hammers the store with rounds of 100 readings, pausing 1ms between rounds, until `duration`
/// has elapsed.
pub fn run_load_test(store: &TelemetryStore, duration: Duration) -> LoadTestReport {
    info!("[LoadTest] Starting load test for {:?}", duration);
    let mut rng = rand::thread_rng();
    let mut measurer = LatencyMeasurer::new(10);
    let mut readings_added = 0usize;
    let started = Instant::now();

    while started.elapsed() < duration {
        for i in 0..LOAD_TEST_ROUND {
            let reading = NewReading::new(
                format!("LOAD_TEST_{}", i % LOAD_TEST_SENSORS),
                rng.r#gen::<f64>() * 100.0,
                "LoadTest",
            );
            let _guard = measurer.measure_with_guard();
            store.add_reading(reading);
            readings_added += 1;
        }
        thread::sleep(LOAD_TEST_PAUSE);
    }

    let elapsed = started.elapsed().as_secs_f64();
    let readings_per_second = if elapsed > 0.0 {
        (readings_added as f64 / elapsed * 100.0).round() / 100.0
    } else {
        0.0
    };
    info!(
        "[LoadTest] Added {} readings in {:.2}s ({} readings/s), latency:{}",
        readings_added,
        elapsed,
        readings_per_second,
        measurer.format_stats()
    );

    LoadTestReport {
        test_duration_seconds: elapsed,
        readings_added,
        readings_per_second,
        total_readings_in_system: store.get_total_readings_count(),
        ingest_latency: measurer.get_stats(),
        test_completed: Utc::now(),
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTimings {
    pub data_retrieval_ms: f64,
    pub aggregation_ms: f64,
    pub alert_retrieval_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub total_readings: usize,
    pub performance: QueryTimings,
    pub stats: WindowStats,
    pub recent_alerts_count: usize,
    pub counters: CounterSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Times the three read paths a dashboard polls and bundles them with the current stats.
pub fn performance_metrics(store: &TelemetryStore) -> PerformanceReport {
    let started = Instant::now();
    let _readings = store.get_recent_readings(METRICS_RETRIEVAL_COUNT);
    let data_retrieval_ms = millis(started.elapsed());

    let started = Instant::now();
    let stats = store.get_aggregated_stats(DEFAULT_STATS_WINDOW);
    let aggregation_ms = millis(started.elapsed());

    let started = Instant::now();
    let alerts = store.get_recent_alerts(DEFAULT_RECENT_ALERTS);
    let alert_retrieval_ms = millis(started.elapsed());

    PerformanceReport {
        total_readings: store.get_total_readings_count(),
        performance: QueryTimings {
            data_retrieval_ms,
            aggregation_ms,
            alert_retrieval_ms,
        },
        stats,
        recent_alerts_count: alerts.len(),
        counters: store.counters().snapshot(),
        timestamp: store.now(),
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
