use crate::error::PushError;
use crate::model::{Alert, Reading, WindowStats};
use crate::store::TelemetryStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use spdlog::{debug, error};
use std::io::Write;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// What gets forwarded to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum Payload {
    Reading(Reading),
    Stats(WindowStats),
    Alerts(Vec<Alert>),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Reading(_) => "reading",
            Payload::Stats(_) => "stats",
            Payload::Alerts(_) => "alerts",
        }
    }
}

/// The outbound side of the real-time push transport. Delivery is best-effort.
pub trait PushChannel: Send + Sync {
    fn push(&self, payload: &Payload) -> Result<(), PushError>;
}

impl<C: PushChannel + ?Sized> PushChannel for Arc<C> {
    fn push(&self, payload: &Payload) -> Result<(), PushError> {
        (**self).push(payload)
    }
}

/// In-process fan-out to any number of bounded subscriber queues.
///
/// A subscriber whose queue is full misses the payload. Dropped receivers are pruned on the
/// next push.
#[derive(Default)]
pub struct BroadcastHub {
    subscribers: Mutex<Vec<SyncSender<Payload>>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, capacity: usize) -> Receiver<Payload> {
        let (tx, rx) = sync_channel(capacity);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }
}

impl PushChannel for BroadcastHub {
    fn push(&self, payload: &Payload) -> Result<(), PushError> {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subscribers.is_empty() {
            return Err(PushError::NoSubscribers);
        }
        subscribers.retain(|tx| match tx.try_send(payload.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        if subscribers.is_empty() {
            return Err(PushError::Disconnected);
        }
        Ok(())
    }
}

/// Writes each payload as one line of JSON.
pub struct JsonLinesChannel<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesChannel<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> PushChannel for JsonLinesChannel<W> {
    fn push(&self, payload: &Payload) -> Result<(), PushError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, payload)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Result of sampling one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub selected: bool,
    pub sent: usize,
    pub failed: usize,
}

/// Forwards a random sample of ingestion activity so subscribers see a rate proportional to the
/// number of batches, not the number of readings.
///
/// One draw per batch decides whether the batch's last reading goes out. Only a selected batch
/// can also carry the short-window stats (second, independent draw) and the latest alerts.
pub struct BroadcastSampler<C> {
    store: Arc<TelemetryStore>,
    channel: C,
    rng: StdRng,
    reading_probability: f64,
    stats_probability: f64,
    stats_window: Duration,
    alert_count: usize,
}

impl<C: PushChannel> BroadcastSampler<C> {
    pub fn new(store: Arc<TelemetryStore>, channel: C) -> Self {
        Self::with_rng(store, channel, StdRng::from_entropy())
    }

    pub fn with_seed(store: Arc<TelemetryStore>, channel: C, seed: u64) -> Self {
        Self::with_rng(store, channel, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: Arc<TelemetryStore>, channel: C, rng: StdRng) -> Self {
        let config = store.config();
        Self {
            reading_probability: config.reading_broadcast_probability,
            stats_probability: config.stats_broadcast_probability,
            stats_window: config.broadcast_stats_window,
            alert_count: config.broadcast_alert_count,
            store,
            channel,
            rng,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn sample_batch(&mut self, batch: &[Reading]) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        let Some(last) = batch.last() else {
            return outcome;
        };
        if self.rng.r#gen::<f64>() >= self.reading_probability {
            return outcome;
        }
        outcome.selected = true;

        self.forward(&Payload::Reading(last.clone()), &mut outcome);

        if self.rng.r#gen::<f64>() < self.stats_probability {
            let stats = self.store.get_aggregated_stats(self.stats_window);
            self.forward(&Payload::Stats(stats), &mut outcome);
        }

        let alerts = self.store.get_recent_alerts(self.alert_count);
        if !alerts.is_empty() {
            self.forward(&Payload::Alerts(alerts), &mut outcome);
        }

        self.store
            .counters()
            .record_broadcast(outcome.sent, outcome.failed);
        outcome
    }

    fn forward(&self, payload: &Payload, outcome: &mut BroadcastOutcome) {
        match self.channel.push(payload) {
            Ok(()) => outcome.sent += 1,
            Err(PushError::NoSubscribers) => {
                debug!("[Broadcast] No subscribers for {} payload", payload.kind());
                outcome.failed += 1;
            }
            Err(e) => {
                error!("[Broadcast] Failed to push {} payload: {}", payload.kind(), e);
                outcome.failed += 1;
            }
        }
    }
}
