use crate::config::RouteConfig;
use crate::controller::store::{RouteStore, StoreError};
use crate::crd::{VirtualService, VirtualServiceSpec};
use crate::labels::{K8S_MANAGED_BY, MANAGED_BY_LABCTL, ROUTE_SOURCE_SERVICE_LABEL};
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Failed to list Services: {0}")]
    ListServices(#[source] StoreError),

    #[error("Failed to list Namespaces: {0}")]
    ListNamespaces(#[source] StoreError),
}

/// Namespace name → region code
pub type RegionMap = BTreeMap<String, String>;

/// Why a Service produced no route object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Routing-enabled label missing or not "true"
    NotRoutable,
    /// Namespace has no (or an empty) region label
    UnresolvedRegion,
    /// No usable port from label, annotation, or the port list
    UnresolvedPort,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotRoutable => write!(f, "routing not enabled"),
            SkipReason::UnresolvedRegion => write!(f, "namespace has no region"),
            SkipReason::UnresolvedPort => write!(f, "no resolvable port"),
        }
    }
}

/// Per-Service result of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Applied { route: String, host: String },
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub namespace: String,
    pub service: String,
    pub outcome: RouteOutcome,
}

/// Aggregated result of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub reports: Vec<ServiceReport>,
}

impl ReconcileSummary {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, RouteOutcome::Applied { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RouteOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RouteOutcome::Failed(_)))
    }

    /// A pass succeeds when no route apply failed; skips are not failures
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&RouteOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.reports {
            let target = format!("{}/{}", report.namespace, report.service);
            match &report.outcome {
                RouteOutcome::Applied { route, host } => {
                    writeln!(f, "{:<40} applied {} ({})", target, route, host)?
                }
                RouteOutcome::Skipped(reason) => writeln!(f, "{:<40} skipped: {}", target, reason)?,
                RouteOutcome::Failed(err) => writeln!(f, "{:<40} failed: {}", target, err)?,
            }
        }
        write!(
            f,
            "{} applied, {} skipped, {} failed",
            self.applied(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Build the namespace → region mapping, ignoring empty region values
pub fn build_region_map(namespaces: &[Namespace], region_label: &str) -> RegionMap {
    namespaces
        .iter()
        .filter_map(|ns| {
            let region = ns.labels().get(region_label)?.trim();
            if region.is_empty() {
                return None;
            }
            Some((ns.name_any(), region.to_string()))
        })
        .collect()
}

/// Deterministic route object name for a Service
pub fn route_name(service_name: &str) -> String {
    format!("route-{}", service_name)
}

/// Compute the external hostname: `{region}-{host}.{ingress_domain}`
pub fn route_host(region: &str, host: &str, ingress_domain: &str) -> String {
    format!("{}-{}.{}", region, host, ingress_domain)
}

/// Non-empty label value for `key`, else non-empty annotation value
fn label_or_annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    let from_label = meta.labels.as_ref().and_then(|l| l.get(key));
    let from_annotation = meta.annotations.as_ref().and_then(|a| a.get(key));

    from_label
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .or_else(|| from_annotation.map(|v| v.trim()).filter(|v| !v.is_empty()))
}

/// Host component: host label → host annotation → Service name
pub fn resolve_host(service: &Service, config: &RouteConfig) -> String {
    label_or_annotation(&service.metadata, &config.host_key)
        .map(str::to_string)
        .unwrap_or_else(|| service.name_any())
}

/// Backend port: port label → port annotation → first declared port
///
/// An override may be a port number or the name of a declared port. An
/// override that matches neither does not fall back to the first port.
pub fn resolve_port(service: &Service, config: &RouteConfig) -> Option<u16> {
    let ports = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_deref())
        .unwrap_or_default();

    match label_or_annotation(&service.metadata, &config.port_key) {
        Some(value) => match value.parse::<u16>() {
            Ok(0) => None,
            Ok(port) => Some(port),
            Err(_) => ports
                .iter()
                .find(|p| p.name.as_deref() == Some(value))
                .and_then(|p| valid_port(p.port)),
        },
        None => ports.first().and_then(|p| valid_port(p.port)),
    }
}

fn valid_port(port: i32) -> Option<u16> {
    u16::try_from(port).ok().filter(|p| *p != 0)
}

fn is_routing_enabled(service: &Service, config: &RouteConfig) -> bool {
    service
        .labels()
        .get(&config.enabled_label)
        .is_some_and(|v| v == "true")
}

/// Derive the route object for a Service
///
/// Pure function of the Service, the region mapping and the config: the same
/// inputs always produce the same object.
pub fn derive_route(
    service: &Service,
    regions: &RegionMap,
    config: &RouteConfig,
) -> Result<VirtualService, SkipReason> {
    if !is_routing_enabled(service, config) {
        return Err(SkipReason::NotRoutable);
    }

    let namespace = service.namespace().unwrap_or_default();
    let region = regions
        .get(&namespace)
        .ok_or(SkipReason::UnresolvedRegion)?;
    let port = resolve_port(service, config).ok_or(SkipReason::UnresolvedPort)?;

    let service_name = service.name_any();
    let host = route_host(region, &resolve_host(service, config), &config.ingress_domain);

    let mut route = VirtualService::new(
        &route_name(&service_name),
        VirtualServiceSpec::single_backend(host, config.gateway.clone(), &service_name, port),
    );
    route.metadata.namespace = Some(namespace);
    route.metadata.labels = Some(BTreeMap::from([
        (K8S_MANAGED_BY.to_string(), MANAGED_BY_LABCTL.to_string()),
        (ROUTE_SOURCE_SERVICE_LABEL.to_string(), service_name),
    ]));

    Ok(route)
}

/// Run one reconciliation pass
///
/// 1. Lists routing-enabled Services and all Namespaces (fatal on error)
/// 2. Derives one route object per Service
/// 3. Applies each route independently; an apply failure is recorded and the
///    pass continues
///
/// # Returns
/// * `Ok(ReconcileSummary)` - Per-Service outcomes (may contain failures)
/// * `Err(ReconcileError)` - Inputs could not be listed, nothing was applied
pub async fn reconcile_routes(
    store: &dyn RouteStore,
    config: &RouteConfig,
) -> Result<ReconcileSummary, ReconcileError> {
    let services = store
        .list_routable_services(&config.enabled_selector())
        .await
        .map_err(ReconcileError::ListServices)?;
    let namespaces = store
        .list_namespaces()
        .await
        .map_err(ReconcileError::ListNamespaces)?;

    let regions = build_region_map(&namespaces, &config.region_label);
    info!(
        services = services.len(),
        regions = regions.len(),
        "Reconciling routes"
    );

    let mut summary = ReconcileSummary::default();

    for service in &services {
        let namespace = service.namespace().unwrap_or_default();
        let name = service.name_any();

        let outcome = match derive_route(service, &regions, config) {
            // Not reported: the lister should never return these
            Err(SkipReason::NotRoutable) => continue,
            Err(reason) => {
                warn!(
                    service = ?name,
                    namespace = ?namespace,
                    reason = %reason,
                    "Skipping Service"
                );
                RouteOutcome::Skipped(reason)
            }
            Ok(route) => {
                let route_name = route.name_any();
                let host = route.spec.hosts.first().cloned().unwrap_or_default();

                match store.apply_route(&route).await {
                    Ok(()) => {
                        info!(
                            service = ?name,
                            namespace = ?namespace,
                            route = ?route_name,
                            host = %host,
                            backend = ?route.spec.primary_backend(),
                            "Route applied"
                        );
                        RouteOutcome::Applied {
                            route: route_name,
                            host,
                        }
                    }
                    Err(e) => {
                        error!(
                            error = ?e,
                            service = ?name,
                            namespace = ?namespace,
                            route = ?route_name,
                            "Failed to apply route"
                        );
                        RouteOutcome::Failed(e.to_string())
                    }
                }
            }
        };

        summary.reports.push(ServiceReport {
            namespace,
            service: name,
            outcome,
        });
    }

    Ok(summary)
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
