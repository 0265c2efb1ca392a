use super::*;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> ManagementClient {
    ManagementClient::new(
        &format!("{}/v3/", server.uri()),
        "token-abc",
        false,
        Duration::from_secs(5),
    )
    .expect("build client")
}

#[test]
fn test_cluster_readiness() {
    let cluster = |state: Option<&str>| ClusterObject {
        id: Some("c-1".to_string()),
        name: Some("lab".to_string()),
        state: state.map(str::to_string),
    };

    assert!(!cluster(None).is_ready());
    assert!(!cluster(Some("")).is_ready());
    assert!(!cluster(Some("provisioning")).is_ready());
    assert!(cluster(Some("pending")).is_ready());
    assert!(cluster(Some("active")).is_ready());
}

#[test]
fn test_empty_manifest_url_is_absent() {
    let token = RegistrationToken {
        id: Some("t-1".to_string()),
        cluster_id: Some("c-1".to_string()),
        manifest_url: Some(String::new()),
    };
    assert_eq!(token.manifest_url(), None);
}

#[test]
fn test_permanent_errors() {
    let status = |code| ApiError::Status {
        method: Method::GET,
        url: "u".to_string(),
        status: code,
        body: String::new(),
    };

    assert!(status(401).is_permanent());
    assert!(status(404).is_permanent());
    assert!(!status(502).is_permanent());
    assert_eq!(status(503).status(), Some(503));
}

#[tokio::test]
async fn test_probe_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3"))
        .and(header("authorization", "Bearer token-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "apiRoot"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    assert_eq!(client.endpoint(), format!("{}/v3", server.uri()));
    client.probe().await.expect("probe should succeed");
}

#[tokio::test]
async fn test_probe_rejected_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let err = client_for(&server).await.probe().await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(err.to_string().contains("Unauthorized"));
}

#[tokio::test]
async fn test_create_cluster_posts_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v3/clusters"))
        .and(body_json(json!({"type": "cluster", "name": "lab"})))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "c-abc", "name": "lab", "state": "provisioning"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let cluster = client_for(&server)
        .await
        .create_cluster("lab")
        .await
        .unwrap();

    assert_eq!(cluster.id.as_deref(), Some("c-abc"));
    assert!(!cluster.is_ready());
}

#[tokio::test]
async fn test_find_clusters_filters_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/clusters"))
        .and(query_param("name", "lab"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "c-1", "name": "lab", "state": "active"},
                {"id": "c-2", "name": "other", "state": "active"}
            ]
        })))
        .mount(&server)
        .await;

    let clusters = client_for(&server)
        .await
        .find_clusters_by_name("lab")
        .await
        .unwrap();

    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].id.as_deref(), Some("c-1"));
}

#[tokio::test]
async fn test_list_registration_tokens_by_cluster() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/clusterregistrationtokens"))
        .and(query_param("clusterId", "c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "c-1:t-1", "clusterId": "c-1", "manifestUrl": "https://r/import.yaml"}]
        })))
        .mount(&server)
        .await;

    let tokens = client_for(&server)
        .await
        .list_registration_tokens("c-1")
        .await
        .unwrap();

    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].manifest_url(), Some("https://r/import.yaml"));
}

#[tokio::test]
async fn test_list_registration_tokens_drops_other_clusters() {
    // Server ignores the clusterId filter
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/clusterregistrationtokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "c-9:t-1", "clusterId": "c-9", "manifestUrl": "https://r/c-9.yaml"},
                {"id": "t-2", "manifestUrl": "https://r/unknown.yaml"},
                {"id": "c-1:t-1", "clusterId": "c-1", "manifestUrl": "https://r/c-1.yaml"}
            ]
        })))
        .mount(&server)
        .await;

    let tokens = client_for(&server)
        .await
        .list_registration_tokens("c-1")
        .await
        .unwrap();

    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].manifest_url(), Some("https://r/c-1.yaml"));
}

#[tokio::test]
async fn test_missing_collection_data_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/clusters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "collection"})))
        .mount(&server)
        .await;

    let clusters = client_for(&server)
        .await
        .find_clusters_by_name("lab")
        .await
        .unwrap();

    assert!(clusters.is_empty());
}

#[tokio::test]
async fn test_delete_cluster_non_2xx() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v3/clusters/c-1"))
        .respond_with(ResponseTemplate::new(409).set_body_string("conflict"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .delete_cluster("c-1")
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn test_fetch_manifest_returns_body_without_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/import/abc.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("kind: Namespace\n"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let body = client
        .fetch_manifest(&format!("{}/v3/import/abc.yaml", server.uri()))
        .await
        .unwrap();

    assert_eq!(body, "kind: Namespace\n");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_decode_error_on_non_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/clusters/c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .get_cluster("c-1")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Decode { .. }));
}
