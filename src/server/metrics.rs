//! Prometheus metrics for the route reconciler
//!
//! - Reconciliation passes and their durations
//! - Per-Service route outcomes
//! - Routes applied by the latest pass

use crate::controller::{ReconcileSummary, RouteOutcome, SkipReason};
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Controller metrics registry
///
/// Clone is cheap (metric handles are reference counted).
#[derive(Clone)]
pub struct ControllerMetrics {
    registry: Registry,
    /// Passes by result (success, partial, error)
    pub reconcile_passes_total: IntCounterVec,
    /// Pass duration in seconds
    pub reconcile_duration_seconds: Histogram,
    /// Per-Service outcomes (applied, skipped_region, skipped_port, failed)
    pub route_outcomes_total: IntCounterVec,
    /// Routes applied by the most recent completed pass
    pub routes_applied: IntGauge,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconcile_passes_total = IntCounterVec::new(
            Opts::new(
                "labctl_reconcile_passes_total",
                "Total number of route reconciliation passes",
            ),
            &["result"],
        )?;
        registry.register(Box::new(reconcile_passes_total.clone()))?;

        let reconcile_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "labctl_reconcile_duration_seconds",
                "Duration of a route reconciliation pass in seconds",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;

        let route_outcomes_total = IntCounterVec::new(
            Opts::new(
                "labctl_route_outcomes_total",
                "Per-Service route outcomes across all passes",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(route_outcomes_total.clone()))?;

        let routes_applied = IntGauge::new(
            "labctl_routes_applied",
            "Routes applied by the most recent pass",
        )?;
        registry.register(Box::new(routes_applied.clone()))?;

        Ok(Self {
            registry,
            reconcile_passes_total,
            reconcile_duration_seconds,
            route_outcomes_total,
            routes_applied,
        })
    }

    /// Record a pass that listed its inputs successfully
    pub fn record_pass(&self, summary: &ReconcileSummary, duration_secs: f64) {
        let result = if summary.is_success() {
            "success"
        } else {
            "partial"
        };
        self.reconcile_passes_total
            .with_label_values(&[result])
            .inc();
        self.reconcile_duration_seconds.observe(duration_secs);

        for report in &summary.reports {
            self.route_outcomes_total
                .with_label_values(&[outcome_label(&report.outcome)])
                .inc();
        }
        self.routes_applied.set(summary.applied() as i64);
    }

    /// Record a pass aborted before any route was derived
    pub fn record_pass_error(&self, duration_secs: f64) {
        self.reconcile_passes_total
            .with_label_values(&["error"])
            .inc();
        self.reconcile_duration_seconds.observe(duration_secs);
    }

    /// Encode all metrics to Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| {
            prometheus::Error::Msg(format!("Failed to encode metrics as UTF-8: {}", e))
        })
    }
}

fn outcome_label(outcome: &RouteOutcome) -> &'static str {
    match outcome {
        RouteOutcome::Applied { .. } => "applied",
        RouteOutcome::Skipped(SkipReason::UnresolvedRegion) => "skipped_region",
        RouteOutcome::Skipped(SkipReason::UnresolvedPort) => "skipped_port",
        RouteOutcome::Skipped(SkipReason::NotRoutable) => "skipped_disabled",
        RouteOutcome::Failed(_) => "failed",
    }
}

/// Shared metrics handle
pub type SharedMetrics = Arc<ControllerMetrics>;

pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(ControllerMetrics::new()?))
}
