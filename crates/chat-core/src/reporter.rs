use crate::stats::{percent, rate, Counters};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// One progress sample. Read-only view over the counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub elapsed_secs: f64,
    pub percent_complete: f64,
    pub completed: u64,
    pub total: u64,
    pub rate_per_sec: f64,
}

impl ProgressSnapshot {
    pub fn sample(counters: &Counters, total: u64, elapsed: Duration) -> Self {
        let completed = counters.snapshot().completed;
        let elapsed_secs = elapsed.as_secs_f64();
        Self {
            elapsed_secs,
            percent_complete: percent(completed, total),
            completed,
            total,
            rate_per_sec: rate(completed, elapsed_secs),
        }
    }
}

pub fn log_progress(snapshot: &ProgressSnapshot) {
    info!(
        "Progress: {:.1}% | Completed: {}/{} | Rate: {:.0} msg/s | Elapsed: {:.1}s",
        snapshot.percent_complete,
        snapshot.completed,
        snapshot.total,
        snapshot.rate_per_sec,
        snapshot.elapsed_secs
    );
}

/// Periodic progress printer running on its own task.
pub struct ProgressReporter {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<u64>,
}

impl ProgressReporter {
    /// Start sampling every `period`; the first sample comes one full period
    /// after start.
    pub fn start<F>(counters: Arc<Counters>, total: u64, period: Duration, mut sink: F) -> Self
    where
        F: FnMut(&ProgressSnapshot) + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(started + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut samples = 0u64;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let snapshot = ProgressSnapshot::sample(&counters, total, started.elapsed());
                        sink(&snapshot);
                        samples += 1;
                    }
                }
            }

            samples
        });

        Self {
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    /// Start with the default `tracing` sink.
    pub fn start_logging(counters: Arc<Counters>, total: u64, period: Duration) -> Self {
        Self::start(counters, total, period, log_progress)
    }

    /// Stop sampling and wait for the task to exit. Returns how many samples
    /// were emitted; none are emitted after this returns.
    pub async fn stop(mut self) -> anyhow::Result<u64> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        Ok(self.handle.await?)
    }
}
