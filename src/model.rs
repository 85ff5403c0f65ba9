use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anything stored in a [`BoundedBuffer`](crate::BoundedBuffer) must expose the instant it was
/// recorded at, so retention purges can decide what to drop.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// A reading as submitted by a producer. It carries no timestamp: the store stamps it on
/// ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReading {
    pub sensor_id: String,
    pub value: f64,
    pub sensor_type: String,
}

impl NewReading {
    pub fn new(sensor_id: impl Into<String>, value: f64, sensor_type: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            value,
            sensor_type: sensor_type.into(),
        }
    }

    pub(crate) fn stamp(self, timestamp: DateTime<Utc>) -> Reading {
        Reading {
            sensor_id: self.sensor_id,
            value: self.value,
            timestamp,
            sensor_type: self.sensor_type,
        }
    }
}

/// An ingested sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub sensor_id: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub sensor_type: String,
}

impl Timestamped for Reading {
    #[inline(always)]
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Statistics over the readings of a trailing window.
///
/// When `count` is zero every numeric field is `0.0` and only the window bounds carry meaning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
    pub standard_deviation: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

impl WindowStats {
    pub fn empty(window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> Self {
        Self {
            average: 0.0,
            min: 0.0,
            max: 0.0,
            count: 0,
            standard_deviation: 0.0,
            window_start,
            window_end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    #[serde(rename = "HIGH_VALUE")]
    High,
    #[serde(rename = "LOW_VALUE")]
    Low,
}

/// A reading that fell outside the sigma band of its window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub sensor_id: String,
    pub value: f64,
    pub threshold: f64,
    pub alert_type: AlertType,
    pub timestamp: DateTime<Utc>,
}

impl Timestamped for Alert {
    #[inline(always)]
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
