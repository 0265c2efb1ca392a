//! Tests for controller metrics

use super::metrics::{create_metrics, ControllerMetrics};
use crate::controller::{ReconcileSummary, RouteOutcome, ServiceReport, SkipReason};

fn report(service: &str, outcome: RouteOutcome) -> ServiceReport {
    ServiceReport {
        namespace: "ns1".to_string(),
        service: service.to_string(),
        outcome,
    }
}

fn mixed_summary() -> ReconcileSummary {
    ReconcileSummary {
        reports: vec![
            report(
                "a",
                RouteOutcome::Applied {
                    route: "route-a".to_string(),
                    host: "us-a.example.com".to_string(),
                },
            ),
            report(
                "b",
                RouteOutcome::Applied {
                    route: "route-b".to_string(),
                    host: "us-b.example.com".to_string(),
                },
            ),
            report("c", RouteOutcome::Skipped(SkipReason::UnresolvedRegion)),
            report("d", RouteOutcome::Skipped(SkipReason::UnresolvedPort)),
        ],
    }
}

#[test]
fn test_metrics_creation() {
    let metrics = ControllerMetrics::new().expect("should create metrics");

    // Prometheus only outputs vector metrics with values
    metrics.record_pass(&mixed_summary(), 0.1);

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("labctl_reconcile_passes_total"));
    assert!(output.contains("labctl_reconcile_duration_seconds"));
    assert!(output.contains("labctl_route_outcomes_total"));
    assert!(output.contains("labctl_routes_applied"));
}

#[test]
fn test_record_pass_counts_outcomes() {
    let metrics = ControllerMetrics::new().expect("should create metrics");

    metrics.record_pass(&mixed_summary(), 0.2);

    let output = metrics.encode().expect("should encode metrics");

    assert!(output.contains("labctl_reconcile_passes_total{result=\"success\"} 1"));
    assert!(output.contains("labctl_route_outcomes_total{outcome=\"applied\"} 2"));
    assert!(output.contains("labctl_route_outcomes_total{outcome=\"skipped_region\"} 1"));
    assert!(output.contains("labctl_route_outcomes_total{outcome=\"skipped_port\"} 1"));
    assert!(output.contains("labctl_routes_applied 2"));
}

#[test]
fn test_record_partial_pass() {
    let metrics = ControllerMetrics::new().expect("should create metrics");
    let summary = ReconcileSummary {
        reports: vec![report("a", RouteOutcome::Failed("conflict".to_string()))],
    };

    metrics.record_pass(&summary, 0.3);

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("labctl_reconcile_passes_total{result=\"partial\"} 1"));
    assert!(output.contains("labctl_route_outcomes_total{outcome=\"failed\"} 1"));
    assert!(output.contains("labctl_routes_applied 0"));
}

#[test]
fn test_record_pass_error() {
    let metrics = ControllerMetrics::new().expect("should create metrics");

    metrics.record_pass_error(2.0);
    metrics.record_pass_error(1.0);

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("labctl_reconcile_passes_total{result=\"error\"} 2"));
    assert!(output.contains("labctl_reconcile_duration_seconds_count 2"));
}

#[test]
fn test_routes_applied_tracks_latest_pass() {
    let metrics = ControllerMetrics::new().expect("should create metrics");

    metrics.record_pass(&mixed_summary(), 0.1);
    metrics.record_pass(&ReconcileSummary::default(), 0.1);

    let output = metrics.encode().expect("should encode metrics");
    assert!(output.contains("labctl_routes_applied 0"));
    assert!(output.contains("labctl_reconcile_passes_total{result=\"success\"} 2"));
}

#[test]
fn test_create_shared_metrics() {
    let metrics = create_metrics().expect("should create shared metrics");

    // Clones share the same registry
    let metrics2 = metrics.clone();
    metrics.record_pass_error(0.1);

    let output = metrics2.encode().expect("should encode from clone");
    assert!(output.contains("labctl_reconcile_passes_total{result=\"error\"} 1"));
}

#[test]
fn test_histogram_buckets() {
    let metrics = ControllerMetrics::new().expect("should create metrics");

    metrics.record_pass_error(0.005);
    metrics.record_pass_error(0.8);
    metrics.record_pass_error(3.0);

    let output = metrics.encode().expect("should encode metrics");

    assert!(output.contains("labctl_reconcile_duration_seconds_bucket{le=\"0.01\"} 1"));
    assert!(output.contains("labctl_reconcile_duration_seconds_bucket{le=\"1\"} 2"));
    assert!(output.contains("labctl_reconcile_duration_seconds_bucket{le=\"+Inf\"} 3"));
    assert!(output.contains("labctl_reconcile_duration_seconds_count 3"));
}
