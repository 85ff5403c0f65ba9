use hdrhistogram::Histogram;
use serde::Serialize;
use std::time::{Duration, Instant};

// 1ns to 1,000s, 3 significant figures.
const LOWEST_NANOS: u64 = 1;
const HIGHEST_NANOS: u64 = 1_000_000_000_000;

/// Statistics for latency measurements, all in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyStats {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
}

pub struct LatencyMeasurerGuard<'a> {
    measurer: &'a mut LatencyMeasurer,
    start: Option<Instant>,
}

impl Drop for LatencyMeasurerGuard<'_> {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            self.measurer.record(start.elapsed());
        }
    }
}

/// Latency recorder backed by an HdrHistogram.
///
/// Only every `sample_rate`-th measurement is recorded, which keeps the overhead negligible on
/// the ingestion path.
pub struct LatencyMeasurer {
    histogram: Histogram<u64>,
    sample_rate: u64,
    step: u64,
}

impl LatencyMeasurer {
    pub fn new(sample_rate: u64) -> Self {
        assert!(sample_rate > 0, "sample_rate must be positive");
        let histogram = Histogram::<u64>::new_with_bounds(LOWEST_NANOS, HIGHEST_NANOS, 3)
            .expect("static histogram bounds are valid");
        Self {
            histogram,
            sample_rate,
            step: 0,
        }
    }

    pub fn measure(&mut self, duration: Duration) {
        if self.should_sample() {
            self.record(duration);
        }
    }

    /// Measures the time until the returned guard is dropped.
    pub fn measure_with_guard(&mut self) -> LatencyMeasurerGuard<'_> {
        let start = self.should_sample().then(Instant::now);
        LatencyMeasurerGuard {
            measurer: self,
            start,
        }
    }

    pub fn reset(&mut self) {
        self.histogram.reset();
        self.step = 0;
    }

    pub fn get_stats(&self) -> LatencyStats {
        let count = self.histogram.len();
        if count == 0 {
            return LatencyStats::default();
        }

        LatencyStats {
            count,
            min: self.histogram.min(),
            max: self.histogram.max(),
            mean: self.histogram.mean(),
            p50: self.histogram.value_at_quantile(0.5),
            p90: self.histogram.value_at_quantile(0.9),
            p99: self.histogram.value_at_quantile(0.99),
            p999: self.histogram.value_at_quantile(0.999),
        }
    }

    pub fn format_stats(&self) -> String {
        let stats = self.get_stats();
        if stats.count == 0 {
            return "No stats collected yet".into();
        }

        format!(
            "\tmin={},\tmax={},\tmean={},\tp50={},\tp90={},\tp99={},\tp999={}",
            format_duration(stats.min as f64),
            format_duration(stats.max as f64),
            format_duration(stats.mean),
            format_duration(stats.p50 as f64),
            format_duration(stats.p90 as f64),
            format_duration(stats.p99 as f64),
            format_duration(stats.p999 as f64),
        )
    }

    fn should_sample(&mut self) -> bool {
        self.step += 1;
        self.step.is_multiple_of(self.sample_rate)
    }

    fn record(&mut self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(HIGHEST_NANOS);
        self.histogram
            .saturating_record(nanos.clamp(LOWEST_NANOS, HIGHEST_NANOS));
    }
}

pub fn format_duration(nanos: f64) -> String {
    if nanos < 1000.0 {
        format!("{:.1}ns", nanos)
    } else if nanos < 1_000_000.0 {
        format!("{:.1}us", nanos / 1000.0)
    } else if nanos < 1_000_000_000.0 {
        format!("{:.1}ms", nanos / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos / 1_000_000_000.0)
    }
}
