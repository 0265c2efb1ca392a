//! Kubernetes access for the route reconciler
//!
//! The reconciler reads Services and Namespaces and writes VirtualServices
//! through the [`RouteStore`] trait, so a pass can run against the cluster or
//! against an in-memory store.

use crate::crd::VirtualService;
use crate::labels::FIELD_MANAGER;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Service};
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Invalid route object: {0}")]
    InvalidObject(String),
}

/// Reads routing inputs and writes route objects
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// List Services (in all namespaces) matching a label selector
    async fn list_routable_services(&self, selector: &str) -> Result<Vec<Service>, StoreError>;

    /// List all Namespaces
    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError>;

    /// Create or update a route object
    ///
    /// Applying an object identical to the stored one must not change it.
    async fn apply_route(&self, route: &VirtualService) -> Result<(), StoreError>;
}

/// [`RouteStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeRouteStore {
    client: Client,
}

impl KubeRouteStore {
    pub fn new(client: Client) -> Self {
        KubeRouteStore { client }
    }
}

#[async_trait]
impl RouteStore for KubeRouteStore {
    async fn list_routable_services(&self, selector: &str) -> Result<Vec<Service>, StoreError> {
        let services: Api<Service> = Api::all(self.client.clone());
        let list = services
            .list(&ListParams::default().labels(selector))
            .await?;
        debug!(selector = %selector, count = list.items.len(), "Listed routable Services");
        Ok(list.items)
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>, StoreError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        Ok(namespaces.list(&ListParams::default()).await?.items)
    }

    async fn apply_route(&self, route: &VirtualService) -> Result<(), StoreError> {
        let namespace = route
            .namespace()
            .ok_or_else(|| StoreError::InvalidObject("route missing namespace".to_string()))?;
        let name = route
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| StoreError::InvalidObject("route missing name".to_string()))?;

        // Server-side apply: the whole object is regenerated on every pass
        let routes: Api<VirtualService> = Api::namespaced(self.client.clone(), &namespace);
        routes
            .patch(
                name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(route),
            )
            .await?;

        Ok(())
    }
}
