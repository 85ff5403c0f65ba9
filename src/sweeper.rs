use crate::coordinator::Shutdown;
use crate::store::{PurgeOutcome, TelemetryStore};
use spdlog::{error, info};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Anything the sweeper can purge on a timer.
pub trait Purgeable: Send + Sync {
    fn purge(&self) -> PurgeOutcome;
}

impl Purgeable for TelemetryStore {
    fn purge(&self) -> PurgeOutcome {
        self.purge_old_data()
    }
}

/// Periodically removes data older than the retention period.
///
/// A sweep that panics is logged and skipped; the next tick runs as usual.
pub struct RetentionSweeper<P: ?Sized = TelemetryStore> {
    target: Arc<P>,
    interval: Duration,
}

impl RetentionSweeper<TelemetryStore> {
    pub fn new(store: Arc<TelemetryStore>) -> Self {
        let interval = store.config().sweep_interval;
        Self {
            target: store,
            interval,
        }
    }
}

impl<P: Purgeable + ?Sized> RetentionSweeper<P> {
    pub fn with_target(target: Arc<P>, interval: Duration) -> Self {
        Self { target, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one purge. Returns `None` if the purge panicked.
    pub fn sweep(&self) -> Option<PurgeOutcome> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.target.purge())) {
            Ok(outcome) => {
                if !outcome.is_empty() {
                    info!(
                        "[Sweeper] Purged {} old readings and {} old alerts. Current count: {}",
                        outcome.readings_removed,
                        outcome.alerts_removed,
                        outcome.readings_remaining
                    );
                }
                Some(outcome)
            }
            Err(cause) => {
                error!("[Sweeper] Error during data purge: {}", panic_message(&*cause));
                None
            }
        }
    }

    /// Sweeps immediately, then once per interval until `shutdown` fires. A sweep in progress
    /// always completes.
    pub fn run(&self, shutdown: &Shutdown) {
        info!("[Sweeper] Retention sweeper started, interval {:?}", self.interval);
        loop {
            self.sweep();
            if shutdown.wait_timeout(self.interval) {
                break;
            }
        }
        info!("[Sweeper] Retention sweeper stopped");
    }
}

pub(crate) fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering::SeqCst;
    use std::thread;

    #[derive(Default)]
    struct Flaky {
        calls: AtomicUsize,
    }

    impl Purgeable for Flaky {
        fn purge(&self) -> PurgeOutcome {
            let call = self.calls.fetch_add(1, SeqCst);
            if call == 0 {
                panic!("corrupted buffer");
            }
            PurgeOutcome {
                readings_removed: call,
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_panicking_sweep_is_not_fatal() {
        let sweeper =
            RetentionSweeper::with_target(Arc::new(Flaky::default()), Duration::from_secs(1));
        assert_eq!(sweeper.sweep(), None);
        assert_eq!(sweeper.sweep().map(|o| o.readings_removed), Some(1));
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let target = Arc::new(Flaky::default());
        let shutdown = Arc::new(Shutdown::new());
        let sweeper = RetentionSweeper::with_target(target.clone(), Duration::from_millis(5));

        let handle = {
            let shutdown = shutdown.clone();
            thread::spawn(move || sweeper.run(&shutdown))
        };
        while target.calls.load(SeqCst) < 3 {
            thread::yield_now();
        }
        shutdown.trigger();
        handle.join().unwrap();
    }

    #[test]
    fn test_default_interval_comes_from_config() {
        let sweeper = RetentionSweeper::new(Arc::new(TelemetryStore::new()));
        assert_eq!(sweeper.interval(), Duration::from_secs(3600));
    }
}
