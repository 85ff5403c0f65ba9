use crate::config::TelemetryConfig;
use crate::model::{Alert, AlertType, Reading, WindowStats};
use std::time::Duration;

/// Flags readings that fall outside `average ± sigma * standard_deviation` of the trailing
/// window they were ingested into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyDetector {
    sigma: f64,
    min_samples: usize,
    window: Duration,
}

impl AnomalyDetector {
    pub fn new(sigma: f64, min_samples: usize, window: Duration) -> Self {
        Self {
            sigma,
            min_samples,
            window,
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(
            config.anomaly_sigma,
            config.anomaly_min_samples,
            config.anomaly_window,
        )
    }

    /// The reference window the store has to aggregate before calling [`evaluate`](Self::evaluate).
    pub fn window(&self) -> Duration {
        self.window
    }

    /// `stats` must already include `reading`.
    pub fn evaluate(&self, reading: &Reading, stats: &WindowStats) -> Option<Alert> {
        if stats.count < self.min_samples {
            return None;
        }
        let spread = self.sigma * stats.standard_deviation;
        if !spread.is_finite() || spread <= 0.0 {
            return None;
        }

        let high = stats.average + spread;
        let low = stats.average - spread;
        let (alert_type, threshold) = if reading.value > high {
            (AlertType::High, high)
        } else if reading.value < low {
            (AlertType::Low, low)
        } else {
            return None;
        };

        Some(Alert {
            sensor_id: reading.sensor_id.clone(),
            value: reading.value,
            threshold,
            alert_type,
            timestamp: reading.timestamp,
        })
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::from_config(&TelemetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewReading;
    use chrono::Utc;

    fn stats(average: f64, standard_deviation: f64, count: usize) -> WindowStats {
        let now = Utc::now();
        WindowStats {
            average,
            min: 0.0,
            max: 0.0,
            count,
            standard_deviation,
            window_start: now,
            window_end: now,
        }
    }

    fn reading(value: f64) -> Reading {
        NewReading::new("SENSOR_007", value, "Pressure").stamp(Utc::now())
    }

    #[test]
    fn test_high_and_low() {
        let detector = AnomalyDetector::default();
        let s = stats(50.0, 5.0, 20);

        let high = detector.evaluate(&reading(66.0), &s).unwrap();
        assert_eq!(high.alert_type, AlertType::High);
        assert_eq!(high.threshold, 60.0);
        assert_eq!(high.sensor_id, "SENSOR_007");

        let low = detector.evaluate(&reading(39.0), &s).unwrap();
        assert_eq!(low.alert_type, AlertType::Low);
        assert_eq!(low.threshold, 40.0);

        assert_eq!(detector.evaluate(&reading(50.0), &s), None);
        // Thresholds themselves are inside the band.
        assert_eq!(detector.evaluate(&reading(60.0), &s), None);
    }

    #[test]
    fn test_needs_min_samples() {
        let detector = AnomalyDetector::default();
        assert_eq!(detector.evaluate(&reading(1e9), &stats(1.0, 1.0, 9)), None);
        assert!(detector.evaluate(&reading(1e9), &stats(1.0, 1.0, 10)).is_some());
    }

    #[test]
    fn test_degenerate_deviation_is_not_anomalous() {
        let detector = AnomalyDetector::default();
        assert_eq!(detector.evaluate(&reading(99.0), &stats(1.0, 0.0, 50)), None);
        assert_eq!(detector.evaluate(&reading(99.0), &stats(1.0, -1.0, 50)), None);
        assert_eq!(
            detector.evaluate(&reading(99.0), &stats(1.0, f64::NAN, 50)),
            None
        );
    }
}
