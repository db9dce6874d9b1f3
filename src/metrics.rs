//! Metrics collection and export module

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Pipeline counters
    pub pipelines_started: IntCounter,
    pub pipelines_succeeded: IntCounter,
    pub pipelines_failed: IntCounter,
    pub pipelines_cancelled: IntCounter,

    // Poll counters
    pub job_polls: IntCounter,
    pub submission_attempts: IntCounter,
    pub submission_retries: IntCounter,
    pub inclusion_polls: IntCounter,
    pub inclusion_slowdowns: IntCounter,
    pub verification_polls: IntCounter,

    // Timeline counters
    pub timeline_updates_queued: IntCounter,
    pub timeline_updates_immediate: IntCounter,

    // Gauges
    pub active_batches: IntGauge,
    pub queue_depth: IntGauge,

    // Histograms
    pub pipeline_latency: Histogram,
    pub job_wait: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let pipelines_started = IntCounter::with_opts(Opts::new(
            "pipelines_started_total",
            "Number of sub-transaction pipelines started",
        ))?;

        let pipelines_succeeded = IntCounter::with_opts(Opts::new(
            "pipelines_succeeded_total",
            "Number of pipelines that reached inclusion",
        ))?;

        let pipelines_failed = IntCounter::with_opts(Opts::new(
            "pipelines_failed_total",
            "Number of pipelines that ended in a terminal error",
        ))?;

        let pipelines_cancelled = IntCounter::with_opts(Opts::new(
            "pipelines_cancelled_total",
            "Number of pipelines stopped by the batch error flag",
        ))?;

        let job_polls = IntCounter::with_opts(Opts::new("job_polls_total", "Proof job status polls"))?;

        let submission_attempts = IntCounter::with_opts(Opts::new(
            "submission_attempts_total",
            "Transaction submission attempts",
        ))?;

        let submission_retries = IntCounter::with_opts(Opts::new(
            "submission_retries_total",
            "Failed submission attempts that were retried",
        ))?;

        let inclusion_polls = IntCounter::with_opts(Opts::new(
            "inclusion_polls_total",
            "Transaction status polls",
        ))?;

        let inclusion_slowdowns = IntCounter::with_opts(Opts::new(
            "inclusion_slowdowns_total",
            "Inclusion polls that reported an error and slowed the cadence",
        ))?;

        let verification_polls = IntCounter::with_opts(Opts::new(
            "verification_polls_total",
            "Contract-state verification polls",
        ))?;

        let timeline_updates_queued = IntCounter::with_opts(Opts::new(
            "timeline_updates_queued_total",
            "Timeline updates delivered through the coalescing queue",
        ))?;

        let timeline_updates_immediate = IntCounter::with_opts(Opts::new(
            "timeline_updates_immediate_total",
            "Timeline updates that bypassed the queue",
        ))?;

        let active_batches = IntGauge::with_opts(Opts::new(
            "active_batches",
            "Number of batches currently in flight",
        ))?;

        let queue_depth = IntGauge::with_opts(Opts::new(
            "timeline_queue_depth",
            "Updates waiting in coalescing queues",
        ))?;

        let pipeline_latency = Histogram::with_opts(
            HistogramOpts::new("pipeline_latency_seconds", "Build-to-inclusion latency")
                .buckets(vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0]),
        )?;

        let job_wait = Histogram::with_opts(
            HistogramOpts::new("job_wait_seconds", "Time spent waiting for proof jobs")
                .buckets(vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(pipelines_started.clone()))?;
        registry.register(Box::new(pipelines_succeeded.clone()))?;
        registry.register(Box::new(pipelines_failed.clone()))?;
        registry.register(Box::new(pipelines_cancelled.clone()))?;
        registry.register(Box::new(job_polls.clone()))?;
        registry.register(Box::new(submission_attempts.clone()))?;
        registry.register(Box::new(submission_retries.clone()))?;
        registry.register(Box::new(inclusion_polls.clone()))?;
        registry.register(Box::new(inclusion_slowdowns.clone()))?;
        registry.register(Box::new(verification_polls.clone()))?;
        registry.register(Box::new(timeline_updates_queued.clone()))?;
        registry.register(Box::new(timeline_updates_immediate.clone()))?;
        registry.register(Box::new(active_batches.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(pipeline_latency.clone()))?;
        registry.register(Box::new(job_wait.clone()))?;

        Ok(Self {
            registry,
            pipelines_started,
            pipelines_succeeded,
            pipelines_failed,
            pipelines_cancelled,
            job_polls,
            submission_attempts,
            submission_retries,
            inclusion_polls,
            inclusion_slowdowns,
            verification_polls,
            timeline_updates_queued,
            timeline_updates_immediate,
            active_batches,
            queue_depth,
            pipeline_latency,
            job_wait,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
