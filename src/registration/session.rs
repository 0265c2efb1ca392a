use chrono::{DateTime, Utc};
use std::fmt;
use tracing::info;

/// Registration workflow states
///
/// `Unconfigured → AuthenticatingPrecheck → ClusterCreateRequested →
/// ClusterProvisioning → ClusterReady → TokenRequested → TokenManifestPending →
/// ManifestApplied`, with `Failed` reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unconfigured,
    AuthenticatingPrecheck,
    ClusterCreateRequested,
    ClusterProvisioning,
    ClusterReady,
    TokenRequested,
    TokenManifestPending,
    ManifestApplied,
    Failed,
}

impl RegistrationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RegistrationState::ManifestApplied | RegistrationState::Failed
        )
    }

    /// Next state on the success path (terminal states have none)
    pub fn next(self) -> Option<RegistrationState> {
        use RegistrationState::*;
        match self {
            Unconfigured => Some(AuthenticatingPrecheck),
            AuthenticatingPrecheck => Some(ClusterCreateRequested),
            ClusterCreateRequested => Some(ClusterProvisioning),
            ClusterProvisioning => Some(ClusterReady),
            ClusterReady => Some(TokenRequested),
            TokenRequested => Some(TokenManifestPending),
            TokenManifestPending => Some(ManifestApplied),
            ManifestApplied | Failed => None,
        }
    }
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationState::Unconfigured => "UNCONFIGURED",
            RegistrationState::AuthenticatingPrecheck => "AUTHENTICATING_PRECHECK",
            RegistrationState::ClusterCreateRequested => "CLUSTER_CREATE_REQUESTED",
            RegistrationState::ClusterProvisioning => "CLUSTER_PROVISIONING",
            RegistrationState::ClusterReady => "CLUSTER_READY",
            RegistrationState::TokenRequested => "TOKEN_REQUESTED",
            RegistrationState::TokenManifestPending => "TOKEN_MANIFEST_PENDING",
            RegistrationState::ManifestApplied => "MANIFEST_APPLIED",
            RegistrationState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// State of one registration run; never persisted
#[derive(Debug, Clone)]
pub struct RegistrationSession {
    pub cluster_name: String,
    pub state: RegistrationState,
    pub cluster_id: Option<String>,
    pub token_id: Option<String>,
    pub manifest_url: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl RegistrationSession {
    pub fn new(cluster_name: &str) -> Self {
        RegistrationSession {
            cluster_name: cluster_name.to_string(),
            state: RegistrationState::Unconfigured,
            cluster_id: None,
            token_id: None,
            manifest_url: None,
            started_at: Utc::now(),
        }
    }

    /// Move to the next success-path state
    pub fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            info!(
                cluster = %self.cluster_name,
                from = %self.state,
                to = %next,
                "Registration state transition"
            );
            self.state = next;
        }
    }

    /// Mark the run failed, returning the state it failed in
    pub fn fail(&mut self) -> RegistrationState {
        let failed_in = self.state;
        self.state = RegistrationState::Failed;
        failed_in
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}
