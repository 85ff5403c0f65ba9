use crate::anomaly::AnomalyDetector;
use crate::buffer::BoundedBuffer;
use crate::clock::{Clock, SystemClock, to_time_delta};
use crate::config::TelemetryConfig;
use crate::counters::IngestCounters;
use crate::error::ConfigError;
use crate::model::{Alert, NewReading, Reading, WindowStats};
use crate::window::WindowAggregator;
use chrono::{DateTime, Utc};
use fxhash::FxHashSet;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// What a retention purge removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeOutcome {
    pub readings_removed: usize,
    pub alerts_removed: usize,
    pub readings_remaining: usize,
}

impl PurgeOutcome {
    pub fn is_empty(&self) -> bool {
        self.readings_removed == 0 && self.alerts_removed == 0
    }
}

/// The telemetry store: bounded reading and alert history with windowed statistics and
/// two-sigma anomaly detection on ingestion.
///
/// The store is passive. It has no threads of its own; retention sweeps and broadcasting are
/// driven by the [`Coordinator`](crate::Coordinator). Every method takes `&self` and the store
/// is meant to be shared behind an `Arc`.
pub struct TelemetryStore {
    config: TelemetryConfig,
    readings: BoundedBuffer<Reading>,
    alerts: BoundedBuffer<Alert>,
    detector: AnomalyDetector,
    clock: Arc<dyn Clock>,
    counters: IngestCounters,
}

impl TelemetryStore {
    /// A store with the default configuration and the system clock.
    pub fn new() -> Self {
        Self::build(TelemetryConfig::default(), Arc::new(SystemClock))
    }

    pub fn try_new(config: TelemetryConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TelemetryConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: TelemetryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            readings: BoundedBuffer::new(config.max_readings),
            alerts: BoundedBuffer::new(config.max_alerts),
            detector: AnomalyDetector::from_config(&config),
            clock,
            counters: IngestCounters::new(),
            config,
        }
    }

    /// Stamps the reading with the store clock, appends it and runs the anomaly check against a
    /// window that already contains it. Returns the stamped reading.
    pub fn add_reading(&self, reading: NewReading) -> Reading {
        let reading = reading.stamp(self.clock.now());
        let evicted = self.readings.append(reading.clone());
        self.counters.record_ingest(evicted);
        self.check_for_anomaly(&reading);
        reading
    }

    /// Ingests a batch one reading at a time, so each anomaly check sees exactly the readings
    /// that preceded it.
    pub fn add_readings(&self, readings: impl IntoIterator<Item = NewReading>) -> Vec<Reading> {
        readings
            .into_iter()
            .map(|reading| self.add_reading(reading))
            .collect()
    }

    /// The `count` most recent readings, oldest first.
    pub fn get_recent_readings(&self, count: usize) -> Vec<Reading> {
        self.readings.recent(count)
    }

    /// The `count` most recent readings of `sensor_type`, oldest first. Scans back from the
    /// newest reading until `count` matches are found.
    pub fn get_recent_readings_by_type(&self, sensor_type: &str, count: usize) -> Vec<Reading> {
        let mut readings: Vec<Reading> = self.readings.with_items(|items| {
            items
                .rev()
                .filter(|r| r.sensor_type == sensor_type)
                .take(count)
                .cloned()
                .collect()
        });
        readings.reverse();
        readings
    }

    pub fn get_aggregated_stats(&self, window: Duration) -> WindowStats {
        let now = self.clock.now();
        self.readings
            .with_items(|items| WindowAggregator::compute(items, now, window))
    }

    /// The `count` most recent alerts, oldest first.
    pub fn get_recent_alerts(&self, count: usize) -> Vec<Alert> {
        self.alerts.recent(count)
    }

    pub fn get_total_readings_count(&self) -> usize {
        self.readings.len()
    }

    pub fn get_total_alerts_count(&self) -> usize {
        self.alerts.len()
    }

    /// Distinct sensor types currently held, sorted.
    pub fn sensor_types(&self) -> Vec<String> {
        let types: FxHashSet<String> = self
            .readings
            .with_items(|items| items.map(|r| r.sensor_type.clone()).collect());
        let mut types: Vec<String> = types.into_iter().collect();
        types.sort_unstable();
        types
    }

    /// Drops readings and alerts older than the retention period.
    pub fn purge_old_data(&self) -> PurgeOutcome {
        let cutoff = self.retention_cutoff();
        let readings_removed = self.readings.purge_older_than(cutoff);
        let alerts_removed = self.alerts.purge_older_than(cutoff);
        self.counters.record_purge(readings_removed, alerts_removed);
        PurgeOutcome {
            readings_removed,
            alerts_removed,
            readings_remaining: self.readings.len(),
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn counters(&self) -> &IngestCounters {
        &self.counters
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn retention_cutoff(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        now.checked_sub_signed(to_time_delta(self.config.retention_period))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn check_for_anomaly(&self, reading: &Reading) {
        let stats = self.get_aggregated_stats(self.detector.window());
        if let Some(alert) = self.detector.evaluate(reading, &stats) {
            self.alerts.append(alert);
            self.counters.record_alert();
        }
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}
