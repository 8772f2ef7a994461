use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Shared completion counters.
///
/// `completed` is never stored; it is derived from the two terminal counts on
/// every snapshot so `completed == succeeded + failed` holds at every read.
#[derive(Debug, Default)]
pub struct Counters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        CounterSnapshot {
            completed: succeeded + failed,
            succeeded,
            failed,
        }
    }
}

const LATENCY_BUCKETS: usize = 10_000;

/// Integer latency histogram: one bucket per millisecond, last bucket
/// absorbs everything at or above 10s.
pub struct LatencyHistogram {
    buckets: Vec<AtomicU64>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: (0..LATENCY_BUCKETS).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    pub fn record(&self, latency_ms: u64) {
        let bucket_idx = latency_ms.min((self.buckets.len() - 1) as u64) as usize;
        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.buckets.iter().map(|b| b.load(Ordering::Relaxed)).sum()
    }

    /// Percentile in whole milliseconds; 0 when nothing was recorded.
    pub fn percentile(&self, p: u64) -> u64 {
        let total = self.count();
        if total == 0 {
            return 0;
        }

        let target = ((total * p) / 100).max(1);
        let mut cumulative = 0u64;

        for (bucket_idx, count) in self.buckets.iter().enumerate() {
            cumulative += count.load(Ordering::Relaxed);
            if cumulative >= target {
                return bucket_idx as u64;
            }
        }

        (self.buckets.len() - 1) as u64
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
}

impl LatencySummary {
    pub fn from_histogram(histogram: &LatencyHistogram) -> Self {
        Self {
            p50_ms: histogram.percentile(50),
            p95_ms: histogram.percentile(95),
            p99_ms: histogram.percentile(99),
        }
    }
}

/// Final statistics of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub timestamp: String,
    pub endpoint: String,
    pub num_users: u64,
    pub messages_per_user: u64,
    pub total_requests: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub success_pct: f64,
    pub failure_pct: f64,
    pub send_duration_secs: f64,
    pub total_duration_secs: f64,
    pub throughput_per_sec: f64,
    pub peak_concurrency: u64,
    pub latency: LatencySummary,
}

/// Inputs gathered by the driver once every send has settled.
pub struct RunMeasurements {
    pub counters: CounterSnapshot,
    pub latency: LatencySummary,
    pub send_duration: Duration,
    pub total_duration: Duration,
    pub peak_concurrency: u64,
}

impl SimulationReport {
    pub fn from_run(
        endpoint: &str,
        num_users: u64,
        messages_per_user: u64,
        run: RunMeasurements,
    ) -> Self {
        let counters = run.counters;
        let total_requests = counters.succeeded + counters.failed;
        let total_duration_secs = run.total_duration.as_secs_f64();

        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            endpoint: endpoint.to_string(),
            num_users,
            messages_per_user,
            total_requests,
            completed: counters.completed,
            succeeded: counters.succeeded,
            failed: counters.failed,
            success_pct: percent(counters.succeeded, total_requests),
            failure_pct: percent(counters.failed, total_requests),
            send_duration_secs: run.send_duration.as_secs_f64(),
            total_duration_secs,
            throughput_per_sec: rate(counters.succeeded, total_duration_secs),
            peak_concurrency: run.peak_concurrency,
            latency: run.latency,
        }
    }
}

pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}

/// Events per second; 0 when no measurable time has passed.
pub fn rate(count: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs < 1e-3 {
        return 0.0;
    }
    count as f64 / elapsed_secs
}
