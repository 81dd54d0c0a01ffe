//! Prometheus metrics for the feedmill pipeline
//!
//! This module tracks:
//! - Fetcher: successful and failed HTTP requests per host
//! - Reconciler: fragments inserted and updated per source, task outcomes,
//!   reconciliation duration
//!
//! # Usage
//!
//! Create one [`Metrics`] at startup and pass it as `Arc<Metrics>` to every
//! component that records something. Each instance owns its own registry, so
//! tests can create as many as they like.

pub mod server;

use prometheus::{
    Encoder, HistogramOpts, HistogramTimer, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Container for all pipeline metrics
pub struct Metrics {
    registry: Registry,
    success_requests: IntCounterVec,
    error_requests: IntCounterVec,
    entries_inserted: IntCounterVec,
    entries_updated: IntCounterVec,
    entries_pruned: IntCounterVec,
    tasks: IntCounterVec,
    reconcile_duration: HistogramVec,
}

impl Metrics {
    /// Register all metrics in a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let success_requests = IntCounterVec::new(
            Opts::new(
                "feedmill_success_requests_total",
                "Total successful HTTP requests by host",
            ),
            &["host"],
        )?;
        let error_requests = IntCounterVec::new(
            Opts::new(
                "feedmill_error_requests_total",
                "Total failed HTTP requests by host and status (0 = transport error)",
            ),
            &["host", "status"],
        )?;
        let entries_inserted = IntCounterVec::new(
            Opts::new(
                "feedmill_entries_inserted_total",
                "Total fragments inserted by source",
            ),
            &["source"],
        )?;
        let entries_updated = IntCounterVec::new(
            Opts::new(
                "feedmill_entries_updated_total",
                "Total fragments rewritten in place by source",
            ),
            &["source"],
        )?;
        let entries_pruned = IntCounterVec::new(
            Opts::new(
                "feedmill_entries_pruned_total",
                "Total orphan fragments deleted by source",
            ),
            &["source"],
        )?;
        let tasks = IntCounterVec::new(
            Opts::new("feedmill_tasks_total", "Total processed tasks by outcome"),
            &["outcome"],
        )?;
        let reconcile_duration = HistogramVec::new(
            HistogramOpts::new(
                "feedmill_reconcile_duration_seconds",
                "Time spent reconciling one entry in seconds",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
            &["source"],
        )?;

        registry.register(Box::new(success_requests.clone()))?;
        registry.register(Box::new(error_requests.clone()))?;
        registry.register(Box::new(entries_inserted.clone()))?;
        registry.register(Box::new(entries_updated.clone()))?;
        registry.register(Box::new(entries_pruned.clone()))?;
        registry.register(Box::new(tasks.clone()))?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        Ok(Self {
            registry,
            success_requests,
            error_requests,
            entries_inserted,
            entries_updated,
            entries_pruned,
            tasks,
            reconcile_duration,
        })
    }

    /// Registry holding every metric of this instance
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Record a successful HTTP request
    pub fn record_request_success(&self, host: &str) {
        self.success_requests.with_label_values(&[host]).inc();
    }

    /// Record a failed HTTP request; `status` is 0 for transport errors
    pub fn record_request_error(&self, host: &str, status: u16) {
        let status = status.to_string();
        self.error_requests.with_label_values(&[host, &status]).inc();
    }

    pub fn record_inserted(&self, source: &str, count: u64) {
        if count > 0 {
            self.entries_inserted.with_label_values(&[source]).inc_by(count);
        }
    }

    pub fn record_updated(&self, source: &str, count: u64) {
        if count > 0 {
            self.entries_updated.with_label_values(&[source]).inc_by(count);
        }
    }

    pub fn record_pruned(&self, source: &str, count: u64) {
        if count > 0 {
            self.entries_pruned.with_label_values(&[source]).inc_by(count);
        }
    }

    /// Record a task outcome (`created`, `updated`, `unchanged`, `failed`)
    pub fn record_task(&self, outcome: &str) {
        self.tasks.with_label_values(&[outcome]).inc();
    }

    /// Start a reconciliation timer; the duration is observed on drop
    pub fn start_reconcile_timer(&self, source: &str) -> HistogramTimer {
        self.reconcile_duration
            .with_label_values(&[source])
            .start_timer()
    }
}
