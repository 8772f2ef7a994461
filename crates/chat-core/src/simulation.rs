use crate::config::SimulationConfig;
use crate::dispatcher::Dispatcher;
use crate::generator::ConversationGenerator;
use crate::reporter::{ProgressReporter, ProgressSnapshot};
use crate::stats::{Counters, LatencyHistogram, LatencySummary, RunMeasurements, SimulationReport};
use crate::submitter::{HttpJsonSubmitter, MessageSubmitter};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const RULE_WIDTH: usize = 70;

type ProgressSink = Box<dyn FnMut(&ProgressSnapshot) + Send + 'static>;

/// Drives one run: generate, dispatch, report.
pub struct Simulation {
    config: SimulationConfig,
    submitter: Arc<dyn MessageSubmitter>,
    progress_sink: Option<ProgressSink>,
}

impl Simulation {
    pub fn new(config: SimulationConfig, submitter: Arc<dyn MessageSubmitter>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            submitter,
            progress_sink: None,
        })
    }

    /// Validated run against the configured HTTP endpoint.
    pub fn over_http(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let submitter = HttpJsonSubmitter::new(&config.endpoint_url, config.request_timeout_ms)
            .context("Failed to create HTTP submitter")?;
        Self::new(config, Arc::new(submitter))
    }

    /// Replace the default `tracing` progress output.
    pub fn with_progress_sink<F>(mut self, sink: F) -> Self
    where
        F: FnMut(&ProgressSnapshot) + Send + 'static,
    {
        self.progress_sink = Some(Box::new(sink));
        self
    }

    pub async fn run(self) -> Result<SimulationReport> {
        let Simulation {
            config,
            submitter,
            progress_sink,
        } = self;
        let total = config.total_messages();

        print_banner(&config);
        let start = Instant::now();

        info!("Using submitter: {}", submitter.name());
        info!("Streaming {} messages and sending simultaneously...", total);

        let counters = Arc::new(Counters::new());
        let latency = Arc::new(LatencyHistogram::new());
        let period = Duration::from_millis(config.report_interval_ms);
        let reporter = match progress_sink {
            Some(sink) => ProgressReporter::start(counters.clone(), total, period, sink),
            None => ProgressReporter::start_logging(counters.clone(), total, period),
        };

        let generator = match config.seed {
            Some(seed) => {
                ConversationGenerator::seeded(config.num_users, config.messages_per_user, seed)
            }
            None => ConversationGenerator::new(config.num_users, config.messages_per_user),
        };

        let send_start = Instant::now();
        let dispatcher = Dispatcher::new(
            submitter,
            counters.clone(),
            latency.clone(),
            config.max_in_flight,
        );
        let dispatched = dispatcher.dispatch(generator).await;
        let samples = reporter.stop().await?;
        let summary = dispatched.context("Dispatch did not settle cleanly")?;
        let send_duration = send_start.elapsed();

        info!(
            "All {} requests completed in {:.2}s ({} progress samples, peak in flight {})",
            summary.settled,
            send_duration.as_secs_f64(),
            samples,
            summary.peak_in_flight
        );

        let report = SimulationReport::from_run(
            &config.endpoint_url,
            config.num_users,
            config.messages_per_user,
            RunMeasurements {
                counters: counters.snapshot(),
                latency: LatencySummary::from_histogram(&latency),
                send_duration,
                total_duration: start.elapsed(),
                peak_concurrency: config.peak_concurrency(),
            },
        );

        print_summary(&report);
        Ok(report)
    }
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn print_banner(config: &SimulationConfig) {
    println!("{}", rule());
    println!("MASSIVE CONVERSATION SIMULATION");
    println!("{}", rule());
    println!("Configuration:");
    println!("   • Users: {}", config.num_users);
    println!("   • Messages per user: {}", config.messages_per_user);
    println!("   • Total messages: {}", config.total_messages());
    println!("   • API URL: {}", config.endpoint_url);
    match config.max_in_flight {
        Some(cap) => println!("   • Max in flight: {}", cap),
        None => println!("   • Max in flight: unlimited"),
    }
    println!("   • Strategy: stream-based generation, one task per message");
    println!("{}", rule());
    println!();
}

pub fn print_summary(report: &SimulationReport) {
    println!();
    println!("{}", rule());
    println!("SIMULATION COMPLETED!");
    println!("{}", rule());
    println!("Request Statistics:");
    println!("   • Total requests sent: {}", report.total_requests);
    println!(
        "   • Successful: {} ({:.2}%)",
        report.succeeded, report.success_pct
    );
    println!("   • Failed: {} ({:.2}%)", report.failed, report.failure_pct);
    println!();
    println!("Performance Metrics:");
    println!("   • Send duration: {:.2}s", report.send_duration_secs);
    println!("   • Total duration: {:.2}s", report.total_duration_secs);
    println!(
        "   • Average throughput: {:.2} messages/second",
        report.throughput_per_sec
    );
    println!("   • Peak concurrent requests: {}", report.peak_concurrency);
    println!(
        "   • Latency p50/p95/p99: {}ms / {}ms / {}ms",
        report.latency.p50_ms, report.latency.p95_ms, report.latency.p99_ms
    );
    println!("{}", rule());
}
