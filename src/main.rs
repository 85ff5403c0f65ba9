use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use spdlog::{Level, LevelFilter, info, warn};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use telemetry_store::config::{
    DEFAULT_ANOMALY_MIN_SAMPLES, DEFAULT_ANOMALY_SIGMA, DEFAULT_MAX_ALERTS, DEFAULT_MAX_READINGS,
    DEFAULT_READING_BROADCAST_PROBABILITY, DEFAULT_RECENT_READINGS, DEFAULT_RETENTION_PERIOD,
    DEFAULT_STATS_BROADCAST_PROBABILITY, DEFAULT_SWEEP_INTERVAL,
};
use telemetry_store::health::{HealthThresholds, SystemHealth, system_health};
use telemetry_store::performance::{PerformanceReport, performance_metrics, run_load_test};
use telemetry_store::{
    BroadcastSampler, Coordinator, JsonLinesChannel, Reading, SensorSimulator, TelemetryConfig,
    TelemetryStore,
};

const WORKER_CHECK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(about = "In-memory sensor telemetry store with anomaly alerts")]
struct Cli {
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the simulator, sweeper and broadcaster, streaming sampled payloads to stdout.
    Run {
        #[arg(long, default_value_t = 10)]
        duration: u64,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        pin_cores: bool,
        /// Most recent readings included in the final summary.
        #[arg(long, default_value_t = DEFAULT_RECENT_READINGS)]
        recent: usize,
    },
    /// Ingest as fast as possible for a while and report throughput.
    LoadTest {
        #[arg(long, default_value_t = 10)]
        duration: u64,
    },
}

#[derive(Args)]
struct StoreArgs {
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_READINGS)]
    max_readings: usize,
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ALERTS)]
    max_alerts: usize,
    #[arg(long, global = true, default_value_t = DEFAULT_RETENTION_PERIOD.as_secs() / 3600)]
    retention_hours: u64,
    #[arg(long, global = true, default_value_t = DEFAULT_ANOMALY_SIGMA)]
    sigma: f64,
    #[arg(long, global = true, default_value_t = DEFAULT_ANOMALY_MIN_SAMPLES)]
    min_samples: usize,
    #[arg(long, global = true, default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs())]
    sweep_interval_secs: u64,
    #[arg(long, global = true, default_value_t = DEFAULT_READING_BROADCAST_PROBABILITY)]
    reading_probability: f64,
    #[arg(long, global = true, default_value_t = DEFAULT_STATS_BROADCAST_PROBABILITY)]
    stats_probability: f64,
}

impl StoreArgs {
    fn to_config(&self) -> TelemetryConfig {
        TelemetryConfig::default()
            .with_max_readings(self.max_readings)
            .with_max_alerts(self.max_alerts)
            .with_retention_period(Duration::from_secs(self.retention_hours.saturating_mul(3600)))
            .with_anomaly_sigma(self.sigma)
            .with_anomaly_min_samples(self.min_samples)
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs))
            .with_broadcast_probabilities(self.reading_probability, self.stats_probability)
    }
}

/// Written to stderr when `run` finishes.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    health: SystemHealth,
    performance: PerformanceReport,
    recent_readings: Vec<Reading>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::Error,
            LogLevel::Warn => Level::Warn,
            LogLevel::Info => Level::Info,
            LogLevel::Debug => Level::Debug,
            LogLevel::Trace => Level::Trace,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    spdlog::default_logger().set_level_filter(LevelFilter::MoreSevereEqual(cli.log_level.into()));

    let store = Arc::new(TelemetryStore::try_new(cli.store.to_config())?);
    info!("[System] Booting telemetry store...");

    match cli.command {
        Command::Run {
            duration,
            seed,
            pin_cores,
            recent,
        } => {
            let mut coordinator = Coordinator::new(store.clone());
            coordinator.set_pin_cores(pin_cores);
            coordinator.start_sweeper()?;

            let channel = JsonLinesChannel::new(io::stdout());
            let sampler = match seed {
                Some(seed) => BroadcastSampler::with_seed(store.clone(), channel, seed),
                None => BroadcastSampler::new(store.clone(), channel),
            };
            coordinator.start_broadcaster(sampler, 1024)?;

            let simulator = match seed {
                Some(seed) => SensorSimulator::with_seed(seed),
                None => SensorSimulator::new(),
            };
            coordinator.start_simulator(simulator)?;

            let deadline = Instant::now() + Duration::from_secs(duration);
            while Instant::now() < deadline {
                if coordinator.has_worker_exited_early() {
                    warn!("[System] A worker stopped before shutdown, ending the run");
                    break;
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                thread::sleep(WORKER_CHECK_INTERVAL.min(remaining));
            }
            coordinator.shutdown();

            let health = system_health(&store, &HealthThresholds::default());
            info!(
                "[System] Health: {:?}, {} readings in the last minute",
                health.status, health.readings_per_minute
            );
            let summary = RunSummary {
                health,
                performance: performance_metrics(&store),
                recent_readings: store.get_recent_readings(recent),
            };
            eprintln!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::LoadTest { duration } => {
            let report = run_load_test(&store, Duration::from_secs(duration));
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    info!("[System] Done!");
    Ok(())
}
