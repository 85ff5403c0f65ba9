use crate::coordinator::{Ingestor, Shutdown};
use crate::model::NewReading;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spdlog::info;
use std::time::{Duration, Instant};

pub const SENSOR_TYPES: [&str; 4] = ["Temperature", "Humidity", "Pressure", "Vibration"];

/// Synthetic producer: a fixed pool of sensors emitting plausible values with occasional spikes.
pub struct SensorSimulator {
    rng: StdRng,
    sensor_ids: Vec<String>,
    batch_size: usize,
    batch_interval: Duration,
}

impl SensorSimulator {
    /// 20 sensors, batches of 10 every 10ms (about 1000 readings per second).
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            sensor_ids: (1..=20).map(|i| format!("SENSOR_{i:03}")).collect(),
            batch_size: 10,
            batch_interval: Duration::from_millis(10),
        }
    }

    pub fn with_batch(mut self, batch_size: usize, batch_interval: Duration) -> Self {
        assert!(batch_size > 0, "batch_size must be greater than 0");
        self.batch_size = batch_size;
        self.batch_interval = batch_interval;
        self
    }

    pub fn next_reading(&mut self) -> NewReading {
        let sensor_id = self.sensor_ids[self.rng.gen_range(0..self.sensor_ids.len())].clone();
        let sensor_type = SENSOR_TYPES[self.rng.gen_range(0..SENSOR_TYPES.len())];
        let value = match sensor_type {
            "Temperature" => self.temperature(),
            "Humidity" => self.humidity(),
            "Pressure" => self.pressure(),
            "Vibration" => self.vibration(),
            _ => self.unit() * 100.0,
        };
        NewReading::new(sensor_id, value, sensor_type)
    }

    pub fn next_batch(&mut self) -> Vec<NewReading> {
        (0..self.batch_size).map(|_| self.next_reading()).collect()
    }

    /// Produces a batch per interval until `shutdown` fires, sleeping only for what is left of
    /// each interval.
    pub fn run(mut self, ingestor: &Ingestor, shutdown: &Shutdown) {
        info!(
            "[Simulator] Sensor simulator started: {} readings every {:?}",
            self.batch_size, self.batch_interval
        );
        let mut produced = 0usize;
        loop {
            let started = Instant::now();
            let batch = self.next_batch();
            produced += ingestor.ingest(batch);

            let remaining = self.batch_interval.saturating_sub(started.elapsed());
            let stopping = if remaining.is_zero() {
                shutdown.is_triggered()
            } else {
                shutdown.wait_timeout(remaining)
            };
            if stopping {
                break;
            }
        }
        info!("[Simulator] Sensor simulator stopped after {} readings", produced);
    }

    fn unit(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    // Around 22C, 5% extreme.
    fn temperature(&mut self) -> f64 {
        let base = 22.0;
        if self.unit() < 0.05 {
            return base + (self.unit() - 0.5) * 40.0;
        }
        base + (self.unit() - 0.5) * 10.0
    }

    fn humidity(&mut self) -> f64 {
        let base = 45.0;
        let variation = (self.unit() - 0.5) * 30.0;
        if self.unit() < 0.03 {
            return (base + (self.unit() - 0.5) * 80.0).clamp(0.0, 100.0);
        }
        (base + variation).clamp(0.0, 100.0)
    }

    // Standard atmosphere, 2% extreme.
    fn pressure(&mut self) -> f64 {
        let base = 1013.25;
        let variation = (self.unit() - 0.5) * 50.0;
        if self.unit() < 0.02 {
            return base + (self.unit() - 0.5) * 200.0;
        }
        base + variation
    }

    fn vibration(&mut self) -> f64 {
        let base = 0.5;
        let variation = self.unit() - 0.5;
        if self.unit() < 0.08 {
            return base + self.unit() * 5.0;
        }
        (base + variation).max(0.0)
    }
}

impl Default for SensorSimulator {
    fn default() -> Self {
        Self::new()
    }
}
