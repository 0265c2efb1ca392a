//! HTTP server for health probes and metrics
//!
//! - `/healthz` - Liveness probe (process is running)
//! - `/readyz` - Readiness probe (first reconciliation pass done)
//! - `/metrics` - Prometheus metrics

mod health;
pub mod metrics;

pub use health::{run_health_server, ReadinessState};
pub use metrics::{create_metrics, ControllerMetrics, SharedMetrics};

#[cfg(test)]
#[path = "health_test.rs"]
mod tests;

#[cfg(test)]
#[path = "metrics_test.rs"]
mod metrics_tests;
