//! HTTP client for the remote cluster-management API
//!
//! JSON over HTTPS with a bearer credential. Every call returns an error for
//! non-2xx responses; the orchestrator decides which of those are fatal.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Cluster state reported while the remote side is still setting up
pub const PROVISIONING_STATE: &str = "provisioning";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    /// HTTP status for non-2xx responses
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Errors that will not go away by polling again (bad credential, object gone)
    pub fn is_permanent(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403) | Some(404))
    }
}

/// Remote cluster object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterObject {
    pub id: Option<String>,
    pub name: Option<String>,
    pub state: Option<String>,
}

impl ClusterObject {
    /// Ready once a state is reported and it is no longer "provisioning"
    pub fn is_ready(&self) -> bool {
        self.state
            .as_deref()
            .is_some_and(|state| !state.is_empty() && state != PROVISIONING_STATE)
    }
}

/// Remote registration-token object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationToken {
    pub id: Option<String>,
    pub cluster_id: Option<String>,
    pub manifest_url: Option<String>,
}

impl RegistrationToken {
    /// Manifest URL, when populated
    pub fn manifest_url(&self) -> Option<&str> {
        self.manifest_url.as_deref().filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Client for the management API rooted at `endpoint` (e.g. "https://rancher.lab/v3")
#[derive(Clone)]
pub struct ManagementClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl ManagementClient {
    pub fn new(
        endpoint: &str,
        token: &str,
        insecure_tls: bool,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure_tls)
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;

        Ok(ManagementClient {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Send and reject non-2xx responses
    async fn send(
        &self,
        method: Method,
        url: String,
        builder: RequestBuilder,
    ) -> Result<Response, ApiError> {
        debug!(method = %method, url = %url, "Management API request");

        let response = builder.send().await.map_err(|source| ApiError::Transport {
            method: method.clone(),
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            method,
            url,
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let builder = self.request(Method::GET, &url).query(query);
        let response = self.send(Method::GET, url.clone(), builder).await?;
        response
            .json()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let builder = self.request(Method::POST, &url).json(body);
        let response = self.send(Method::POST, url.clone(), builder).await?;
        response
            .json()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }

    /// Verify the endpoint is reachable and the credential accepted
    pub async fn probe(&self) -> Result<(), ApiError> {
        let url = self.endpoint.clone();
        let builder = self.request(Method::GET, &url);
        self.send(Method::GET, url, builder).await?;
        Ok(())
    }

    pub async fn create_cluster(&self, name: &str) -> Result<ClusterObject, ApiError> {
        self.post_json("clusters", &json!({ "type": "cluster", "name": name }))
            .await
    }

    pub async fn get_cluster(&self, id: &str) -> Result<ClusterObject, ApiError> {
        self.get_json(&format!("clusters/{}", id), &[]).await
    }

    pub async fn find_clusters_by_name(&self, name: &str) -> Result<Vec<ClusterObject>, ApiError> {
        let collection: Collection<ClusterObject> =
            self.get_json("clusters", &[("name", name)]).await?;
        // Some servers ignore unknown filters; match the name client-side as well
        Ok(collection
            .data
            .into_iter()
            .filter(|c| c.name.as_deref() == Some(name))
            .collect())
    }

    pub async fn delete_cluster(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&format!("clusters/{}", id));
        let builder = self.request(Method::DELETE, &url);
        self.send(Method::DELETE, url, builder).await?;
        Ok(())
    }

    pub async fn create_registration_token(
        &self,
        cluster_id: &str,
    ) -> Result<RegistrationToken, ApiError> {
        self.post_json(
            "clusterregistrationtokens",
            &json!({ "type": "clusterRegistrationToken", "clusterId": cluster_id }),
        )
        .await
    }

    pub async fn get_registration_token(&self, id: &str) -> Result<RegistrationToken, ApiError> {
        self.get_json(&format!("clusterregistrationtokens/{}", id), &[])
            .await
    }

    pub async fn list_registration_tokens(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<RegistrationToken>, ApiError> {
        let collection: Collection<RegistrationToken> = self
            .get_json("clusterregistrationtokens", &[("clusterId", cluster_id)])
            .await?;
        // A token issued for another cluster carries that cluster's import manifest
        Ok(collection
            .data
            .into_iter()
            .filter(|t| t.cluster_id.as_deref() == Some(cluster_id))
            .collect())
    }

    /// Download the manifest behind a token's manifest URL
    ///
    /// The URL embeds its own credential, so no bearer header is sent.
    pub async fn fetch_manifest(&self, manifest_url: &str) -> Result<String, ApiError> {
        let builder = self.http.get(manifest_url);
        let response = self
            .send(Method::GET, manifest_url.to_string(), builder)
            .await?;
        response.text().await.map_err(|source| ApiError::Decode {
            url: manifest_url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
