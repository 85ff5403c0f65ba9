use crate::clock::to_time_delta;
use crate::model::{Reading, WindowStats};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Start of the trailing window `[now - window, now]`.
#[inline(always)]
pub fn window_start(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(to_time_delta(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Computes [`WindowStats`] over readings stamped at or after `now - window`.
///
/// Every call rescans its input. Standard deviation is the population one (divides by `count`).
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowAggregator;

impl WindowAggregator {
    pub fn compute<'a>(
        readings: impl IntoIterator<Item = &'a Reading>,
        now: DateTime<Utc>,
        window: Duration,
    ) -> WindowStats {
        let start = window_start(now, window);
        let values: Vec<f64> = readings
            .into_iter()
            .filter(|r| r.timestamp >= start)
            .map(|r| r.value)
            .collect();
        Self::from_values(&values, start, now)
    }

    pub fn from_values(values: &[f64], start: DateTime<Utc>, end: DateTime<Utc>) -> WindowStats {
        if values.is_empty() {
            return WindowStats::empty(start, end);
        }

        let count = values.len();
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &value in values {
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }
        let average = sum / count as f64;
        let variance = values
            .iter()
            .map(|v| (v - average).powi(2))
            .sum::<f64>()
            / count as f64;

        WindowStats {
            average,
            min,
            max,
            count,
            standard_deviation: variance.sqrt(),
            window_start: start,
            window_end: end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewReading;
    use chrono::TimeDelta;

    fn reading(value: f64, at: DateTime<Utc>) -> Reading {
        NewReading::new("SENSOR_001", value, "Temperature").stamp(at)
    }

    #[test]
    fn test_known_values() {
        let now = Utc::now();
        let readings = [reading(10.0, now), reading(20.0, now), reading(30.0, now)];
        let stats = WindowAggregator::compute(&readings, now, Duration::from_secs(300));

        assert_eq!(stats.count, 3);
        assert_eq!(stats.average, 20.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert!((stats.standard_deviation - 8.164_965_809).abs() < 1e-6);
        assert_eq!(stats.window_end, now);
        assert_eq!(stats.window_start, now - TimeDelta::minutes(5));
    }

    #[test]
    fn test_only_window_members_count() {
        let now = Utc::now();
        let readings = [
            reading(1000.0, now - TimeDelta::minutes(10)),
            reading(4.0, now - TimeDelta::minutes(5)),
            reading(6.0, now - TimeDelta::seconds(1)),
        ];
        let stats = WindowAggregator::compute(&readings, now, Duration::from_secs(300));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, 5.0);
        assert_eq!(stats.standard_deviation, 1.0);
    }

    #[test]
    fn test_empty_window() {
        let now = Utc::now();
        let readings = [reading(1.0, now - TimeDelta::hours(1))];
        let stats = WindowAggregator::compute(&readings, now, Duration::from_secs(60));
        assert_eq!(stats, WindowStats::empty(now - TimeDelta::minutes(1), now));
    }

    #[test]
    fn test_huge_window_does_not_overflow() {
        let now = Utc::now();
        let readings = [reading(3.0, now)];
        let stats = WindowAggregator::compute(&readings, now, Duration::MAX);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.window_start, DateTime::<Utc>::MIN_UTC);
    }
}
