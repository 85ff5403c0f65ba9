use crate::store::TelemetryStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// Throughput floors, in readings per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    pub low_throughput: f64,
    pub critical_throughput: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            low_throughput: 500.0,
            critical_throughput: 100.0,
        }
    }
}

impl HealthThresholds {
    pub fn classify(&self, readings_per_second: f64) -> HealthStatus {
        if readings_per_second < self.critical_throughput {
            HealthStatus::Critical
        } else if readings_per_second < self.low_throughput {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub total_readings: usize,
    pub readings_per_minute: usize,
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

/// Ingestion throughput over the last minute, graded against `thresholds`.
pub fn system_health(store: &TelemetryStore, thresholds: &HealthThresholds) -> SystemHealth {
    let readings_per_minute = store.get_aggregated_stats(Duration::from_secs(60)).count;
    SystemHealth {
        total_readings: store.get_total_readings_count(),
        readings_per_minute,
        status: thresholds.classify(readings_per_minute as f64 / 60.0),
        timestamp: store.now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewReading;

    #[test]
    fn test_classify() {
        let thresholds = HealthThresholds::default();
        assert_eq!(thresholds.classify(1000.0), HealthStatus::Healthy);
        assert_eq!(thresholds.classify(500.0), HealthStatus::Healthy);
        assert_eq!(thresholds.classify(499.9), HealthStatus::Warning);
        assert_eq!(thresholds.classify(99.0), HealthStatus::Critical);
    }

    #[test]
    fn test_idle_store_is_critical() {
        let store = TelemetryStore::new();
        store.add_reading(NewReading::new("SENSOR_001", 1.0, "Pressure"));
        let health = system_health(&store, &HealthThresholds::default());
        assert_eq!(health.readings_per_minute, 1);
        assert_eq!(health.status, HealthStatus::Critical);
    }
}
