//! Route reconciler
//!
//! Derives one Istio VirtualService per routing-enabled Service:
//! - `routes`: derivation rules and the reconciliation pass
//! - `store`: Kubernetes reads and writes behind the `RouteStore` trait

pub mod routes;
pub mod store;

pub use routes::{
    build_region_map, derive_route, reconcile_routes, ReconcileError, ReconcileSummary,
    RouteOutcome, ServiceReport, SkipReason,
};
pub use store::{KubeRouteStore, RouteStore, StoreError};

use crate::config::RouteConfig;
use crate::server::SharedMetrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Everything a reconciliation pass needs
pub struct Context {
    pub store: Arc<dyn RouteStore>,
    pub config: RouteConfig,
    pub metrics: Option<SharedMetrics>,
}

impl Context {
    pub fn new(store: Arc<dyn RouteStore>, config: RouteConfig) -> Self {
        Context {
            store,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Run one pass and record its outcome in metrics (when configured)
pub async fn run_pass(ctx: &Context) -> Result<ReconcileSummary, ReconcileError> {
    let start = Instant::now();
    let result = reconcile_routes(ctx.store.as_ref(), &ctx.config).await;
    let duration_secs = start.elapsed().as_secs_f64();

    match &result {
        Ok(summary) => {
            info!(
                applied = summary.applied(),
                skipped = summary.skipped(),
                failed = summary.failed(),
                duration_secs = duration_secs,
                "Reconciliation pass finished"
            );
            if let Some(metrics) = &ctx.metrics {
                metrics.record_pass(summary, duration_secs);
            }
        }
        Err(e) => {
            error!(error = %e, "Reconciliation pass aborted");
            if let Some(metrics) = &ctx.metrics {
                metrics.record_pass_error(duration_secs);
            }
        }
    }

    result
}
