use crate::error::ConfigError;
use std::time::Duration;

pub const DEFAULT_MAX_READINGS: usize = 100_000;
pub const DEFAULT_MAX_ALERTS: usize = 1_000;
pub const DEFAULT_RETENTION_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_ANOMALY_SIGMA: f64 = 2.0;
pub const DEFAULT_ANOMALY_MIN_SAMPLES: usize = 10;
pub const DEFAULT_ANOMALY_WINDOW: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_READING_BROADCAST_PROBABILITY: f64 = 0.10;
pub const DEFAULT_STATS_BROADCAST_PROBABILITY: f64 = 0.30;
pub const DEFAULT_BROADCAST_STATS_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_BROADCAST_ALERT_COUNT: usize = 5;

/// Default `count` for recent-readings queries.
pub const DEFAULT_RECENT_READINGS: usize = 1_000;
/// Default `count` for recent-alerts queries.
pub const DEFAULT_RECENT_ALERTS: usize = 100;
/// Default window for aggregated-stats queries.
pub const DEFAULT_STATS_WINDOW: Duration = DEFAULT_ANOMALY_WINDOW;

/// Tunables of the store and its background workers.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub max_readings: usize,
    pub max_alerts: usize,
    pub retention_period: Duration,
    pub anomaly_sigma: f64,
    pub anomaly_min_samples: usize,
    pub anomaly_window: Duration,
    pub sweep_interval: Duration,
    pub reading_broadcast_probability: f64,
    pub stats_broadcast_probability: f64,
    pub broadcast_stats_window: Duration,
    pub broadcast_alert_count: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_readings: DEFAULT_MAX_READINGS,
            max_alerts: DEFAULT_MAX_ALERTS,
            retention_period: DEFAULT_RETENTION_PERIOD,
            anomaly_sigma: DEFAULT_ANOMALY_SIGMA,
            anomaly_min_samples: DEFAULT_ANOMALY_MIN_SAMPLES,
            anomaly_window: DEFAULT_ANOMALY_WINDOW,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            reading_broadcast_probability: DEFAULT_READING_BROADCAST_PROBABILITY,
            stats_broadcast_probability: DEFAULT_STATS_BROADCAST_PROBABILITY,
            broadcast_stats_window: DEFAULT_BROADCAST_STATS_WINDOW,
            broadcast_alert_count: DEFAULT_BROADCAST_ALERT_COUNT,
        }
    }
}

impl TelemetryConfig {
    pub fn with_max_readings(mut self, max_readings: usize) -> Self {
        self.max_readings = max_readings;
        self
    }

    pub fn with_max_alerts(mut self, max_alerts: usize) -> Self {
        self.max_alerts = max_alerts;
        self
    }

    pub fn with_retention_period(mut self, retention_period: Duration) -> Self {
        self.retention_period = retention_period;
        self
    }

    pub fn with_anomaly_sigma(mut self, sigma: f64) -> Self {
        self.anomaly_sigma = sigma;
        self
    }

    pub fn with_anomaly_min_samples(mut self, min_samples: usize) -> Self {
        self.anomaly_min_samples = min_samples;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_broadcast_probabilities(mut self, reading: f64, stats: f64) -> Self {
        self.reading_broadcast_probability = reading;
        self.stats_broadcast_probability = stats;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_readings == 0 {
            return Err(ConfigError::ZeroCapacity {
                name: "max_readings",
            });
        }
        if self.max_alerts == 0 {
            return Err(ConfigError::ZeroCapacity { name: "max_alerts" });
        }
        if !self.anomaly_sigma.is_finite() || self.anomaly_sigma <= 0.0 {
            return Err(ConfigError::InvalidSigma(self.anomaly_sigma));
        }
        for (name, value) in [
            ("retention_period", self.retention_period),
            ("anomaly_window", self.anomaly_window),
            ("sweep_interval", self.sweep_interval),
            ("broadcast_stats_window", self.broadcast_stats_window),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { name });
            }
        }
        for (name, value) in [
            (
                "reading_broadcast_probability",
                self.reading_broadcast_probability,
            ),
            (
                "stats_broadcast_probability",
                self.stats_broadcast_probability,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ProbabilityOutOfRange { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TelemetryConfig::default();
        assert_eq!(config.max_readings, 100_000);
        assert_eq!(config.max_alerts, 1_000);
        assert_eq!(config.retention_period, Duration::from_secs(86_400));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = TelemetryConfig::default().with_max_readings(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroCapacity {
                name: "max_readings"
            })
        );

        let config = TelemetryConfig::default().with_anomaly_sigma(-1.0);
        assert_eq!(config.validate(), Err(ConfigError::InvalidSigma(-1.0)));

        let config = TelemetryConfig::default().with_broadcast_probabilities(1.5, 0.3);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ProbabilityOutOfRange { value, .. }) if value == 1.5
        ));

        let config = TelemetryConfig::default().with_sweep_interval(Duration::ZERO);
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration {
                name: "sweep_interval"
            })
        );
    }
}
