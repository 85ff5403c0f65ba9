use crate::broadcast::{BroadcastSampler, PushChannel};
use crate::model::{NewReading, Reading};
use crate::simulator::SensorSimulator;
use crate::store::TelemetryStore;
use crate::sweeper::{RetentionSweeper, panic_message};
use spdlog::{error, info, warn};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError, sync_channel};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const BROADCAST_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative cancellation signal shared by all background workers.
#[derive(Debug, Default)]
pub struct Shutdown {
    triggered: Mutex<bool>,
    condvar: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        *self.triggered.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.condvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.triggered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps for up to `timeout`, waking early on shutdown. Returns whether shutdown fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let triggered = self.triggered.lock().unwrap_or_else(PoisonError::into_inner);
        let (triggered, _) = self
            .condvar
            .wait_timeout_while(triggered, timeout, |triggered| !*triggered)
            .unwrap_or_else(PoisonError::into_inner);
        *triggered
    }
}

/// Producer-side handle: ingests into the store and hands each stamped batch to the broadcaster.
///
/// The broadcaster queue is bounded. When it is full the batch is still stored but not offered
/// for sampling.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<TelemetryStore>,
    queue: Option<SyncSender<Vec<Reading>>>,
}

impl Ingestor {
    pub fn new(store: Arc<TelemetryStore>) -> Self {
        Self { store, queue: None }
    }

    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    /// Returns the number of readings ingested.
    pub fn ingest(&self, batch: Vec<NewReading>) -> usize {
        let stamped = self.store.add_readings(batch);
        let count = stamped.len();
        if let Some(queue) = &self.queue {
            match queue.try_send(stamped) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(_)) => self.store.counters().record_dropped_batch(),
            }
        }
        count
    }
}

/// Owns the background workers around a [`TelemetryStore`]: the retention sweeper, the broadcast
/// sampler and optionally a sensor simulator. Dropping the coordinator shuts them down.
pub struct Coordinator {
    store: Arc<TelemetryStore>,
    shutdown: Arc<Shutdown>,
    workers: Vec<(&'static str, JoinHandle<()>)>,
    batch_queue: Option<SyncSender<Vec<Reading>>>,
    pin_cores: bool,
}

impl Coordinator {
    pub fn new(store: Arc<TelemetryStore>) -> Self {
        Self {
            store,
            shutdown: Arc::new(Shutdown::new()),
            workers: vec![],
            batch_queue: None,
            pin_cores: false,
        }
    }

    /// Pin each worker thread to its own core, round-robin over the available cores.
    pub fn set_pin_cores(&mut self, pin_cores: bool) {
        self.pin_cores = pin_cores;
    }

    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    pub fn shutdown_signal(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    /// A producer handle. Batches are offered to the broadcaster only if it was started before
    /// the handle was taken.
    pub fn ingestor(&self) -> Ingestor {
        Ingestor {
            store: self.store.clone(),
            queue: self.batch_queue.clone(),
        }
    }

    pub fn start_sweeper(&mut self) -> io::Result<()> {
        let sweeper = RetentionSweeper::new(self.store.clone());
        self.spawn_worker("sweeper", move |shutdown| sweeper.run(&shutdown))
    }

    /// Starts the broadcast worker and returns an ingestor wired to it.
    pub fn start_broadcaster<C>(
        &mut self,
        sampler: BroadcastSampler<C>,
        queue_capacity: usize,
    ) -> io::Result<Ingestor>
    where
        C: PushChannel + 'static,
    {
        let (tx, rx) = sync_channel(queue_capacity);
        self.spawn_worker("broadcaster", move |shutdown| {
            run_broadcaster(sampler, rx, &shutdown)
        })?;
        self.batch_queue = Some(tx);
        Ok(self.ingestor())
    }

    pub fn start_simulator(&mut self, simulator: SensorSimulator) -> io::Result<()> {
        let ingestor = self.ingestor();
        self.spawn_worker("simulator", move |shutdown| {
            simulator.run(&ingestor, &shutdown)
        })
    }

    /// True if a worker thread has ended while shutdown was never requested, which means it
    /// returned or panicked on its own.
    pub fn has_worker_exited_early(&self) -> bool {
        !self.shutdown.is_triggered() && self.workers.iter().any(|(_, h)| h.is_finished())
    }

    /// Signals every worker and waits for them. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            self.shutdown.trigger();
            return;
        }
        info!("[Coordinator] Shutting down {} workers", self.workers.len());
        self.shutdown.trigger();
        self.batch_queue = None;
        for (name, handle) in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("[Coordinator] Worker '{}' panicked", name);
            }
        }
    }

    fn spawn_worker(
        &mut self,
        name: &'static str,
        body: impl FnOnce(Arc<Shutdown>) + Send + 'static,
    ) -> io::Result<()> {
        let worker_id = self.workers.len();
        let pin_cores = self.pin_cores;
        let shutdown = self.shutdown.clone();
        let handle = thread::Builder::new()
            .name(format!("telemetry-{name}"))
            .spawn(move || {
                if pin_cores
                    && let Some(core_ids) = core_affinity::get_core_ids()
                    && let Some(core_id) = core_ids.get(worker_id % core_ids.len().max(1))
                {
                    core_affinity::set_for_current(*core_id);
                }
                body(shutdown);
            })?;
        self.workers.push((name, handle));
        Ok(())
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_broadcaster<C: PushChannel>(
    mut sampler: BroadcastSampler<C>,
    batches: Receiver<Vec<Reading>>,
    shutdown: &Shutdown,
) {
    info!("[Broadcast] Broadcaster started");
    while !shutdown.is_triggered() {
        let batch = match batches.recv_timeout(BROADCAST_POLL_INTERVAL) {
            Ok(batch) => batch,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(|| sampler.sample_batch(&batch)))
        {
            warn!(
                "[Broadcast] Error sending real-time update: {}",
                panic_message(&*cause)
            );
        }
    }
    info!("[Broadcast] Broadcaster stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{BroadcastHub, Payload};
    use crate::config::TelemetryConfig;
    use std::time::Instant;

    #[test]
    fn test_wait_timeout_wakes_on_trigger() {
        let shutdown = Arc::new(Shutdown::new());
        let waiter = {
            let shutdown = shutdown.clone();
            thread::spawn(move || shutdown.wait_timeout(Duration::from_secs(3600)))
        };
        thread::sleep(Duration::from_millis(10));
        shutdown.trigger();
        assert!(waiter.join().unwrap());
        assert!(!Shutdown::new().wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn test_ingestor_without_broadcaster() {
        let coordinator = Coordinator::new(Arc::new(TelemetryStore::new()));
        let ingestor = coordinator.ingestor();
        let count = ingestor.ingest(vec![NewReading::new("SENSOR_001", 1.0, "Pressure")]);
        assert_eq!(count, 1);
        assert_eq!(coordinator.store().get_total_readings_count(), 1);
    }

    #[test]
    fn test_broadcaster_forwards_batches_and_stops() {
        let config = TelemetryConfig::default().with_broadcast_probabilities(1.0, 0.0);
        let store = Arc::new(TelemetryStore::try_new(config).unwrap());
        let hub = Arc::new(BroadcastHub::new());
        let rx = hub.subscribe(64);

        let mut coordinator = Coordinator::new(store.clone());
        coordinator.start_sweeper().unwrap();
        let sampler = BroadcastSampler::with_seed(store.clone(), hub.clone(), 11);
        let ingestor = coordinator.start_broadcaster(sampler, 16).unwrap();

        ingestor.ingest(vec![
            NewReading::new("SENSOR_001", 1.0, "Pressure"),
            NewReading::new("SENSOR_002", 2.0, "Pressure"),
        ]);

        let payload = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        match payload {
            Payload::Reading(r) => assert_eq!(r.sensor_id, "SENSOR_002"),
            other => panic!("unexpected payload {other:?}"),
        }

        let started = Instant::now();
        coordinator.shutdown();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!coordinator.has_worker_exited_early());
        coordinator.shutdown();
    }

    #[test]
    fn test_worker_exiting_on_its_own_is_reported() {
        let mut coordinator = Coordinator::new(Arc::new(TelemetryStore::new()));
        coordinator.spawn_worker("oneshot", |_| {}).unwrap();
        let started = Instant::now();
        while !coordinator.has_worker_exited_early() {
            assert!(started.elapsed() < Duration::from_secs(5), "worker exit not reported");
            thread::sleep(Duration::from_millis(1));
        }

        coordinator.shutdown();
        assert!(!coordinator.has_worker_exited_early());
    }
}
