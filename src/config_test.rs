use super::*;
use std::collections::HashMap;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_route_config_defaults() {
    let config = RouteConfig::new("example.com");

    assert_eq!(config.ingress_domain, "example.com");
    assert_eq!(config.gateway, "istio-system/lab-gateway");
    assert_eq!(config.enabled_selector(), "routing.lab.io/enabled=true");
    assert_eq!(config.region_label, "topology.lab.io/region");
}

#[test]
fn test_registration_defaults_match_poll_bounds() {
    let config = RegistrationConfig::default();

    assert_eq!(config.cluster_poll, PollConfig::new(5_000, 12));
    assert_eq!(config.manifest_poll, PollConfig::new(5_000, 60));
    assert_eq!(config.cluster_name, "lab");
    assert!(!config.reuse_existing_cluster);
    assert!(config.endpoint.is_none());
}

#[test]
fn test_debug_redacts_token() {
    let config = RegistrationConfig {
        token: Some("token-abc:secret".to_string()),
        ..Default::default()
    };

    let rendered = format!("{:?}", config);
    assert!(!rendered.contains("secret"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn test_env_lookup_without_domain_is_absent() {
    let config = load_from_lookup(lookup_from(&[("LABCTL_REMOTE_URL", "https://r/v3")])).unwrap();
    assert!(config.is_none());
}

#[test]
fn test_env_lookup_populates_config() {
    let config = load_from_lookup(lookup_from(&[
        ("LABCTL_INGRESS_DOMAIN", "lab.example.com"),
        ("LABCTL_GATEWAY", "mesh/gw"),
        ("LABCTL_REMOTE_URL", "https://rancher.lab/v3"),
        ("LABCTL_REMOTE_TOKEN", "token-1"),
        ("LABCTL_CLUSTER_NAME", "kind-lab"),
        ("LABCTL_INSECURE_TLS", "true"),
    ]))
    .unwrap()
    .unwrap();

    assert_eq!(config.routes.ingress_domain, "lab.example.com");
    assert_eq!(config.routes.gateway, "mesh/gw");
    assert_eq!(
        config.registration.endpoint.as_deref(),
        Some("https://rancher.lab/v3")
    );
    assert_eq!(config.registration.token.as_deref(), Some("token-1"));
    assert_eq!(config.registration.cluster_name, "kind-lab");
    assert!(config.registration.insecure_tls);
}

#[test]
fn test_env_lookup_rejects_bad_bool() {
    let result = load_from_lookup(lookup_from(&[
        ("LABCTL_INGRESS_DOMAIN", "lab.example.com"),
        ("LABCTL_INSECURE_TLS", "yes please"),
    ]));

    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn test_resolve_skips_missing_and_incomplete_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("dev.toml"),
        "[registration]\ncluster_name = \"no-domain\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("staging.toml"),
        r#"
[routes]
ingress_domain = "staging.example.com"

[registration]
endpoint = "https://rancher.staging/v3"
cluster_name = "staging-lab"

[registration.cluster_poll]
interval_ms = 1000
max_attempts = 3
"#,
    )
    .unwrap();

    let candidates = default_candidates(dir.path());
    let config = resolve_config(&candidates[..4]).unwrap();

    assert_eq!(config.routes.ingress_domain, "staging.example.com");
    assert_eq!(config.registration.cluster_name, "staging-lab");
    assert_eq!(config.registration.cluster_poll, PollConfig::new(1_000, 3));
    // Unset poll keeps its default
    assert_eq!(config.registration.manifest_poll, PollConfig::new(5_000, 60));
}

#[test]
fn test_resolve_prefers_earlier_source() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("local.toml"),
        "[routes]\ningress_domain = \"local.test\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("prod.toml"),
        "[routes]\ningress_domain = \"prod.test\"\n",
    )
    .unwrap();

    let candidates = default_candidates(dir.path());
    let config = resolve_config(&candidates[..4]).unwrap();

    assert_eq!(config.routes.ingress_domain, "local.test");
}

#[test]
fn test_resolve_malformed_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[routes\ningress_domain = ").unwrap();

    let result = resolve_config(&[ConfigSource::File(path)]);

    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn test_resolve_nothing_found() {
    let dir = tempfile::tempdir().unwrap();
    let result = resolve_config(&[ConfigSource::File(dir.path().join("absent.toml"))]);

    match result {
        Err(ConfigError::NotFound(tried)) => assert!(tried.contains("absent.toml")),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[test]
fn test_default_candidates_order() {
    let candidates = default_candidates(Path::new("/etc/labctl"));

    assert_eq!(candidates.len(), 5);
    assert_eq!(
        candidates[0],
        ConfigSource::File(PathBuf::from("/etc/labctl/local.toml"))
    );
    assert_eq!(
        candidates[3],
        ConfigSource::File(PathBuf::from("/etc/labctl/prod.toml"))
    );
    assert_eq!(candidates[4], ConfigSource::Env);
}
