use crate::config::RegistrationConfig;
use crate::registration::client::{ApiError, ManagementClient};
use crate::registration::manifest::{ApplyError, ManifestApplier};
use crate::registration::session::{RegistrationSession, RegistrationState};
use crate::retry::{poll_bounded, PollOutcome};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Remote management API not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("Invalid management API client settings: {0}")]
    Client(#[source] ApiError),

    #[error("Management API precheck failed: {0}")]
    Precheck(#[source] ApiError),

    #[error("Failed to look up cluster by name: {0}")]
    ClusterLookup(#[source] ApiError),

    #[error("Failed to create cluster object: {0}")]
    ClusterCreate(#[source] ApiError),

    #[error("Cluster creation response carried no cluster id")]
    MissingClusterId,

    #[error("Failed to poll cluster {cluster_id}: {source}")]
    ClusterPoll {
        cluster_id: String,
        #[source]
        source: ApiError,
    },

    #[error("Cluster {cluster_id} did not become ready after {attempts} attempts")]
    ClusterNotReady { cluster_id: String, attempts: u32 },

    #[error("Failed to create registration token for cluster {cluster_id}: {source}")]
    TokenCreate {
        cluster_id: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to poll registration token for cluster {cluster_id}: {source}")]
    ManifestPoll {
        cluster_id: String,
        #[source]
        source: ApiError,
    },

    #[error("Registration manifest for cluster {cluster_id} did not become ready after {attempts} attempts")]
    ManifestUrlTimeout { cluster_id: String, attempts: u32 },

    #[error("Failed to fetch registration manifest for cluster {cluster_id}: {source}")]
    ManifestFetch {
        cluster_id: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to apply registration manifest for cluster {cluster_id}: {source}")]
    ManifestApply {
        cluster_id: String,
        #[source]
        source: ApplyError,
    },

    #[error("Failed to delete cluster {cluster_id}: {source}")]
    ClusterDelete {
        cluster_id: String,
        #[source]
        source: ApiError,
    },
}

impl RegistrationError {
    /// State the registration run was in when it failed (None for deregistration errors)
    pub fn failed_state(&self) -> Option<RegistrationState> {
        use RegistrationError::*;
        match self {
            NotConfigured(_) | Client(_) => Some(RegistrationState::Unconfigured),
            Precheck(_) => Some(RegistrationState::AuthenticatingPrecheck),
            ClusterLookup(_) | ClusterCreate(_) | MissingClusterId => {
                Some(RegistrationState::ClusterCreateRequested)
            }
            ClusterPoll { .. } | ClusterNotReady { .. } => {
                Some(RegistrationState::ClusterProvisioning)
            }
            TokenCreate { .. } => Some(RegistrationState::TokenRequested),
            ManifestPoll { .. }
            | ManifestUrlTimeout { .. }
            | ManifestFetch { .. }
            | ManifestApply { .. } => Some(RegistrationState::TokenManifestPending),
            ClusterDelete { .. } => None,
        }
    }

    /// Remote cluster object left behind by a failed registration
    ///
    /// Deregistering the cluster name removes it.
    pub fn orphaned_cluster(&self) -> Option<&str> {
        use RegistrationError::*;
        match self {
            ClusterPoll { cluster_id, .. }
            | ClusterNotReady { cluster_id, .. }
            | TokenCreate { cluster_id, .. }
            | ManifestPoll { cluster_id, .. }
            | ManifestUrlTimeout { cluster_id, .. }
            | ManifestFetch { cluster_id, .. }
            | ManifestApply { cluster_id, .. } => Some(cluster_id),
            _ => None,
        }
    }
}

/// Result of a successful registration run
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationReport {
    pub cluster_name: String,
    pub cluster_id: String,
    pub token_id: Option<String>,
    pub manifest_url: String,
    pub applied_objects: usize,
    pub elapsed_secs: i64,
}

impl fmt::Display for RegistrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cluster {} registered as {} ({} objects applied in {}s)",
            self.cluster_name, self.cluster_id, self.applied_objects, self.elapsed_secs
        )
    }
}

/// Result of a successful deregistration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deregistration {
    /// No cluster object with the configured name exists
    AlreadyAbsent,
    Deleted { cluster_ids: Vec<String> },
}

impl fmt::Display for Deregistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deregistration::AlreadyAbsent => write!(f, "cluster already deregistered"),
            Deregistration::Deleted { cluster_ids } => {
                write!(f, "deleted cluster {}", cluster_ids.join(", "))
            }
        }
    }
}

/// Drives the remote management API to attach the local cluster
pub struct Orchestrator {
    config: RegistrationConfig,
}

impl Orchestrator {
    pub fn new(config: RegistrationConfig) -> Self {
        Orchestrator { config }
    }

    fn client(&self) -> Result<ManagementClient, RegistrationError> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(RegistrationError::NotConfigured("endpoint"))?;
        let token = self
            .config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(RegistrationError::NotConfigured("token"))?;

        ManagementClient::new(
            endpoint,
            token,
            self.config.insecure_tls,
            Duration::from_secs(self.config.request_timeout_secs),
        )
        .map_err(RegistrationError::Client)
    }

    /// Register the cluster with the remote control plane, applying the
    /// returned manifest through `applier`
    ///
    /// Not idempotent: unless `reuse_existing_cluster` is set, every run creates
    /// a new remote cluster object, even if one with the same name exists.
    ///
    /// # Returns
    /// * `Ok(RegistrationReport)` - Manifest applied to the local cluster
    /// * `Err(RegistrationError)` - Run failed; see `orphaned_cluster()` for
    ///   remote state left behind
    pub async fn register(
        &self,
        applier: &dyn ManifestApplier,
    ) -> Result<RegistrationReport, RegistrationError> {
        let mut session = RegistrationSession::new(&self.config.cluster_name);

        match self.drive(&mut session, applier).await {
            Ok(applied_objects) => {
                let report = RegistrationReport {
                    cluster_name: session.cluster_name.clone(),
                    cluster_id: session.cluster_id.clone().unwrap_or_default(),
                    token_id: session.token_id.clone(),
                    manifest_url: session.manifest_url.clone().unwrap_or_default(),
                    applied_objects,
                    elapsed_secs: session.elapsed().num_seconds(),
                };
                info!(
                    cluster = %report.cluster_name,
                    cluster_id = %report.cluster_id,
                    objects = report.applied_objects,
                    "Cluster registered"
                );
                Ok(report)
            }
            Err(e) => {
                let failed_in = session.fail();
                error!(
                    cluster = %session.cluster_name,
                    state = %failed_in,
                    orphaned_cluster = ?e.orphaned_cluster(),
                    error = %e,
                    "Registration failed"
                );
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        session: &mut RegistrationSession,
        applier: &dyn ManifestApplier,
    ) -> Result<usize, RegistrationError> {
        let client = self.client()?;

        session.advance();
        client.probe().await.map_err(RegistrationError::Precheck)?;
        info!(endpoint = %client.endpoint(), "Management API reachable");

        session.advance();
        let cluster_id = self.create_or_reuse_cluster(&client, &session.cluster_name).await?;
        session.cluster_id = Some(cluster_id.clone());

        session.advance();
        self.wait_for_cluster(&client, &cluster_id).await?;
        session.advance();

        session.advance();
        let token = client
            .create_registration_token(&cluster_id)
            .await
            .map_err(|source| RegistrationError::TokenCreate {
                cluster_id: cluster_id.clone(),
                source,
            })?;
        session.token_id = token.id.clone();

        session.advance();
        let manifest_url = self
            .wait_for_manifest_url(&client, &cluster_id, token.id.as_deref())
            .await?;
        session.manifest_url = Some(manifest_url.clone());

        let manifest = client
            .fetch_manifest(&manifest_url)
            .await
            .map_err(|source| RegistrationError::ManifestFetch {
                cluster_id: cluster_id.clone(),
                source,
            })?;
        let applied = applier
            .apply(&manifest)
            .await
            .map_err(|source| RegistrationError::ManifestApply {
                cluster_id: cluster_id.clone(),
                source,
            })?;

        session.advance();
        Ok(applied)
    }

    async fn create_or_reuse_cluster(
        &self,
        client: &ManagementClient,
        name: &str,
    ) -> Result<String, RegistrationError> {
        if self.config.reuse_existing_cluster {
            let existing = client
                .find_clusters_by_name(name)
                .await
                .map_err(RegistrationError::ClusterLookup)?;
            if let Some(id) = existing.into_iter().find_map(|c| c.id) {
                info!(cluster = %name, cluster_id = %id, "Reusing existing cluster object");
                return Ok(id);
            }
        }

        let cluster = client
            .create_cluster(name)
            .await
            .map_err(RegistrationError::ClusterCreate)?;
        let id = cluster
            .id
            .filter(|id| !id.is_empty())
            .ok_or(RegistrationError::MissingClusterId)?;

        info!(cluster = %name, cluster_id = %id, "Cluster object created");
        Ok(id)
    }

    async fn wait_for_cluster(
        &self,
        client: &ManagementClient,
        cluster_id: &str,
    ) -> Result<(), RegistrationError> {
        let outcome = poll_bounded(
            &self.config.cluster_poll,
            "cluster_state",
            move |attempt| async move {
                match client.get_cluster(cluster_id).await {
                    Ok(cluster) if cluster.is_ready() => Ok(cluster.state),
                    Ok(cluster) => {
                        debug!(
                            cluster_id = %cluster_id,
                            attempt = attempt,
                            state = ?cluster.state,
                            "Cluster not ready yet"
                        );
                        Ok(None)
                    }
                    Err(e) if e.is_permanent() => Err(RegistrationError::ClusterPoll {
                        cluster_id: cluster_id.to_string(),
                        source: e,
                    }),
                    Err(e) => {
                        warn!(cluster_id = %cluster_id, attempt = attempt, error = %e, "Cluster state poll failed");
                        Ok(None)
                    }
                }
            },
        )
        .await?;

        match outcome {
            PollOutcome::Ready { value, attempts } => {
                info!(cluster_id = %cluster_id, state = %value, attempts = attempts, "Cluster ready");
                Ok(())
            }
            PollOutcome::TimedOut { attempts } => Err(RegistrationError::ClusterNotReady {
                cluster_id: cluster_id.to_string(),
                attempts,
            }),
        }
    }

    /// Poll for the manifest URL: direct token lookup first, then list by cluster id
    async fn wait_for_manifest_url(
        &self,
        client: &ManagementClient,
        cluster_id: &str,
        token_id: Option<&str>,
    ) -> Result<String, RegistrationError> {
        let outcome = poll_bounded(
            &self.config.manifest_poll,
            "manifest_url",
            move |attempt| async move {
                if let Some(token_id) = token_id {
                    match client.get_registration_token(token_id).await {
                        Ok(token) => {
                            if let Some(url) = token.manifest_url() {
                                return Ok(Some(url.to_string()));
                            }
                        }
                        Err(e) => {
                            debug!(token_id = %token_id, attempt = attempt, error = %e, "Direct token lookup failed, falling back to list");
                        }
                    }
                }

                match client.list_registration_tokens(cluster_id).await {
                    Ok(tokens) => Ok(tokens
                        .iter()
                        .find_map(|t| t.manifest_url())
                        .map(str::to_string)),
                    Err(e) if e.is_permanent() => Err(RegistrationError::ManifestPoll {
                        cluster_id: cluster_id.to_string(),
                        source: e,
                    }),
                    Err(e) => {
                        warn!(cluster_id = %cluster_id, attempt = attempt, error = %e, "Registration token poll failed");
                        Ok(None)
                    }
                }
            },
        )
        .await?;

        match outcome {
            PollOutcome::Ready { value, attempts } => {
                info!(cluster_id = %cluster_id, attempts = attempts, "Registration manifest URL issued");
                Ok(value)
            }
            PollOutcome::TimedOut { attempts } => Err(RegistrationError::ManifestUrlTimeout {
                cluster_id: cluster_id.to_string(),
                attempts,
            }),
        }
    }

    /// Delete every remote cluster object with the configured name
    ///
    /// Idempotent: no matching object is success. Each delete must return 2xx.
    pub async fn deregister(&self) -> Result<Deregistration, RegistrationError> {
        let client = self.client()?;
        let name = &self.config.cluster_name;

        let cluster_ids: Vec<String> = client
            .find_clusters_by_name(name)
            .await
            .map_err(RegistrationError::ClusterLookup)?
            .into_iter()
            .filter_map(|c| c.id)
            .collect();

        if cluster_ids.is_empty() {
            info!(cluster = %name, "No cluster object found, already deregistered");
            return Ok(Deregistration::AlreadyAbsent);
        }
        if cluster_ids.len() > 1 {
            warn!(cluster = %name, count = cluster_ids.len(), "Several cluster objects share this name, deleting all");
        }

        for id in &cluster_ids {
            client
                .delete_cluster(id)
                .await
                .map_err(|source| RegistrationError::ClusterDelete {
                    cluster_id: id.clone(),
                    source,
                })?;
            info!(cluster = %name, cluster_id = %id, "Cluster object deleted");
        }

        Ok(Deregistration::Deleted { cluster_ids })
    }
}
