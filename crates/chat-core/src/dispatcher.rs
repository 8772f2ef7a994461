use crate::generator::MessageRecord;
use crate::stats::{Counters, LatencyHistogram};
use crate::submitter::MessageSubmitter;
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Sends started.
    pub issued: u64,
    /// Sends that reached a terminal state and were joined.
    pub settled: u64,
    /// Most sends observed in flight at once.
    pub peak_in_flight: u64,
}

/// Fires one send per generated message without waiting on earlier sends.
pub struct Dispatcher {
    submitter: Arc<dyn MessageSubmitter>,
    counters: Arc<Counters>,
    latency: Arc<LatencyHistogram>,
    limit: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(
        submitter: Arc<dyn MessageSubmitter>,
        counters: Arc<Counters>,
        latency: Arc<LatencyHistogram>,
        max_in_flight: Option<usize>,
    ) -> Self {
        Self {
            submitter,
            counters,
            latency,
            limit: max_in_flight.map(|cap| Arc::new(Semaphore::new(cap))),
        }
    }

    /// Drain `messages`, spawning a send for each, then wait for every send
    /// to settle. A failed or panicked send never cancels the others.
    pub async fn dispatch<I>(&self, messages: I) -> Result<DispatchSummary>
    where
        I: IntoIterator<Item = MessageRecord>,
    {
        let mut tasks = JoinSet::new();
        let in_flight = Arc::new(AtomicU64::new(0));
        let peak = Arc::new(AtomicU64::new(0));
        let mut issued = 0u64;

        for message in messages {
            let permit = match &self.limit {
                Some(semaphore) => Some(semaphore.clone().acquire_owned().await?),
                None => None,
            };

            let submitter = self.submitter.clone();
            let counters = self.counters.clone();
            let latency = self.latency.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();

            let now = in_flight.fetch_add(1, Ordering::Relaxed) + 1;
            peak.fetch_max(now, Ordering::Relaxed);

            tasks.spawn(async move {
                match submitter.submit(&message).await {
                    Ok(outcome) => {
                        latency.record(outcome.latency_ms);
                        if outcome.is_success() {
                            counters.record_success();
                        } else {
                            debug!(
                                "✗ [{} → {}]: {:?}",
                                message.from, message.to, outcome.status
                            );
                            counters.record_failure();
                        }
                    }
                    Err(e) => {
                        debug!("✗ [{} → {}]: {:#}", message.from, message.to, e);
                        counters.record_failure();
                    }
                }
                in_flight.fetch_sub(1, Ordering::Relaxed);
                drop(permit);
            });
            issued += 1;

            // Let the new send (and the reporter) run before pulling the next record.
            tokio::task::yield_now().await;
        }

        info!(
            "Issued {} sends via {}, waiting for them to settle...",
            issued,
            self.submitter.name()
        );

        let mut settled = 0u64;
        let mut join_failures = 0u64;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(()) => settled += 1,
                Err(e) => {
                    warn!("Send task did not complete: {}", e);
                    join_failures += 1;
                }
            }
        }

        if join_failures > 0 {
            anyhow::bail!(
                "{} of {} send tasks aborted before recording an outcome",
                join_failures,
                issued
            );
        }

        Ok(DispatchSummary {
            issued,
            settled,
            peak_in_flight: peak.load(Ordering::Relaxed),
        })
    }
}
