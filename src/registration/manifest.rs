//! Applying the registration manifest to the local cluster
//!
//! The manifest is a multi-document YAML stream of arbitrary kinds. Each
//! document is resolved through API discovery and server-side applied.

use crate::labels::FIELD_MANAGER;
use async_trait::async_trait;
use kube::api::{Api, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::discovery::{Discovery, Scope};
use kube::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("Invalid manifest YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Manifest document {index} is missing {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("Manifest contains no objects")]
    Empty,

    #[error("Failed to create Kubernetes client: {0}")]
    Client(#[source] kube::Error),

    #[error("API discovery failed: {0}")]
    Discovery(#[source] kube::Error),

    #[error("Unknown resource type {0}")]
    UnknownKind(String),

    #[error("Failed to apply {kind}/{name}: {source}")]
    Kube {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

/// One object of a manifest stream
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestDocument {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
    pub value: serde_json::Value,
}

/// Applies a manifest onto the local cluster
#[async_trait]
pub trait ManifestApplier: Send + Sync {
    /// Apply every object in `manifest`, returning how many were applied
    async fn apply(&self, manifest: &str) -> Result<usize, ApplyError>;
}

/// Split a YAML stream into documents, dropping empty ones
///
/// Documents come back ordered for apply: Namespaces first, then CRDs, then
/// everything else in stream order.
pub fn parse_manifest_documents(manifest: &str) -> Result<Vec<ManifestDocument>, ApplyError> {
    let mut documents = Vec::new();

    for (index, doc) in serde_yaml::Deserializer::from_str(manifest).enumerate() {
        let value = serde_json::Value::deserialize(doc)?;
        if value.is_null() {
            continue;
        }

        let field = |pointer: &str| value.pointer(pointer).and_then(|v| v.as_str());
        let api_version = field("/apiVersion")
            .ok_or(ApplyError::MissingField {
                index,
                field: "apiVersion",
            })?
            .to_string();
        let kind = field("/kind")
            .ok_or(ApplyError::MissingField {
                index,
                field: "kind",
            })?
            .to_string();
        let name = field("/metadata/name")
            .ok_or(ApplyError::MissingField {
                index,
                field: "metadata.name",
            })?
            .to_string();
        let namespace = field("/metadata/namespace").map(str::to_string);

        documents.push(ManifestDocument {
            api_version,
            kind,
            name,
            namespace,
            value,
        });
    }

    // Stable: equal priorities keep stream order
    documents.sort_by_key(|doc| kind_priority(&doc.kind));
    Ok(documents)
}

/// Apply order for a kind (lower = first)
pub fn kind_priority(kind: &str) -> u8 {
    match kind {
        "Namespace" => 0,
        "CustomResourceDefinition" => 1,
        _ => 2,
    }
}

/// Split "group/version" (or core "version") into (group, version)
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// [`ManifestApplier`] using the Kubernetes API
///
/// The client is inferred from the environment on the first apply, so
/// building the applier never requires a kubeconfig.
#[derive(Default)]
pub struct KubeManifestApplier {
    client: OnceCell<Client>,
}

impl KubeManifestApplier {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self) -> Result<Client, ApplyError> {
        self.client
            .get_or_try_init(Client::try_default)
            .await
            .cloned()
            .map_err(ApplyError::Client)
    }
}

#[async_trait]
impl ManifestApplier for KubeManifestApplier {
    async fn apply(&self, manifest: &str) -> Result<usize, ApplyError> {
        let documents = parse_manifest_documents(manifest)?;
        if documents.is_empty() {
            return Err(ApplyError::Empty);
        }

        let client = self.client().await?;
        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .map_err(ApplyError::Discovery)?;
        let params = PatchParams::apply(FIELD_MANAGER).force();

        for doc in &documents {
            let (group, version) = parse_api_version(&doc.api_version);
            let gvk = GroupVersionKind::gvk(&group, &version, &doc.kind);
            let Some((resource, caps)) = discovery.resolve_gvk(&gvk) else {
                return Err(ApplyError::UnknownKind(format!(
                    "{}/{}",
                    doc.api_version, doc.kind
                )));
            };

            let api: Api<DynamicObject> = if caps.scope == Scope::Namespaced {
                let namespace = doc.namespace.as_deref().unwrap_or("default");
                Api::namespaced_with(client.clone(), namespace, &resource)
            } else {
                Api::all_with(client.clone(), &resource)
            };

            api.patch(&doc.name, &params, &Patch::Apply(&doc.value))
                .await
                .map_err(|source| ApplyError::Kube {
                    kind: doc.kind.clone(),
                    name: doc.name.clone(),
                    source,
                })?;

            debug!(kind = %doc.kind, name = %doc.name, namespace = ?doc.namespace, "Applied manifest object");
        }

        info!(objects = documents.len(), "Manifest applied");
        Ok(documents.len())
    }
}
