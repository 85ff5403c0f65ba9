mod anomaly;
mod broadcast;
mod buffer;
mod clock;
pub mod config;
mod coordinator;
mod counters;
mod error;
pub mod health;
pub mod measure;
mod model;
pub mod performance;
mod simulator;
mod store;
mod sweeper;
mod window;

pub use crate::anomaly::AnomalyDetector;
pub use crate::broadcast::{
    BroadcastHub, BroadcastOutcome, BroadcastSampler, JsonLinesChannel, Payload, PushChannel,
};
pub use crate::buffer::BoundedBuffer;
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::TelemetryConfig;
pub use crate::coordinator::{Coordinator, Ingestor, Shutdown};
pub use crate::counters::{CounterSnapshot, IngestCounters};
pub use crate::error::{ConfigError, PushError};
pub use crate::model::{Alert, AlertType, NewReading, Reading, Timestamped, WindowStats};
pub use crate::simulator::{SENSOR_TYPES, SensorSimulator};
pub use crate::store::{PurgeOutcome, TelemetryStore};
pub use crate::sweeper::{Purgeable, RetentionSweeper};
pub use crate::window::{WindowAggregator, window_start};
