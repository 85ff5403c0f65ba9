use serde::Serialize;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

/// Monotonic activity counters shared by the store and its workers.
#[derive(Debug, Default)]
pub struct IngestCounters {
    readings_ingested: AtomicU64,
    readings_evicted: AtomicU64,
    alerts_raised: AtomicU64,
    readings_purged: AtomicU64,
    alerts_purged: AtomicU64,
    broadcasts_sent: AtomicU64,
    broadcast_failures: AtomicU64,
    batches_dropped: AtomicU64,
}

/// Point-in-time copy of [`IngestCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub readings_ingested: u64,
    pub readings_evicted: u64,
    pub alerts_raised: u64,
    pub readings_purged: u64,
    pub alerts_purged: u64,
    pub broadcasts_sent: u64,
    pub broadcast_failures: u64,
    pub batches_dropped: u64,
}

impl IngestCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_ingest(&self, evicted: usize) {
        self.readings_ingested.fetch_add(1, Relaxed);
        self.readings_evicted.fetch_add(evicted as u64, Relaxed);
    }

    pub(crate) fn record_alert(&self) {
        self.alerts_raised.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_purge(&self, readings: usize, alerts: usize) {
        self.readings_purged.fetch_add(readings as u64, Relaxed);
        self.alerts_purged.fetch_add(alerts as u64, Relaxed);
    }

    pub(crate) fn record_broadcast(&self, sent: usize, failed: usize) {
        self.broadcasts_sent.fetch_add(sent as u64, Relaxed);
        self.broadcast_failures.fetch_add(failed as u64, Relaxed);
    }

    pub(crate) fn record_dropped_batch(&self) {
        self.batches_dropped.fetch_add(1, Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            readings_ingested: self.readings_ingested.load(Relaxed),
            readings_evicted: self.readings_evicted.load(Relaxed),
            alerts_raised: self.alerts_raised.load(Relaxed),
            readings_purged: self.readings_purged.load(Relaxed),
            alerts_purged: self.alerts_purged.load(Relaxed),
            broadcasts_sent: self.broadcasts_sent.load(Relaxed),
            broadcast_failures: self.broadcast_failures.load(Relaxed),
            batches_dropped: self.batches_dropped.load(Relaxed),
        }
    }
}
