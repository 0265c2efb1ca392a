use super::*;
use clap::CommandFactory;

#[test]
fn test_cli_definition_is_valid() {
    Options::command().debug_assert();
}

#[test]
fn test_watch_defaults() {
    let options = Options::try_parse_from(["labctl", "watch"]).unwrap();

    match options.command {
        Command::Watch {
            interval_secs,
            health_port,
        } => {
            assert_eq!(interval_secs, 30);
            assert_eq!(health_port, HEALTH_PORT);
        }
        other => panic!("expected watch, got {:?}", other),
    }
}

#[test]
fn test_explicit_config_file_is_only_source() {
    let options =
        Options::try_parse_from(["labctl", "reconcile", "--config", "/etc/labctl.toml"]).unwrap();

    let sources = config_sources(&options);

    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0], ConfigSource::File(PathBuf::from("/etc/labctl.toml")));
}

#[test]
fn test_config_dir_yields_candidates_then_env() {
    let options = Options::try_parse_from(["labctl", "--config-dir", "/srv/lab", "register"]).unwrap();

    let sources = config_sources(&options);

    assert_eq!(sources.len(), 5);
    assert_eq!(sources[0], ConfigSource::File(PathBuf::from("/srv/lab/local.toml")));
    assert_eq!(sources[4], ConfigSource::Env);
}

#[test]
fn test_missing_subcommand_is_rejected() {
    assert!(Options::try_parse_from(["labctl"]).is_err());
}

#[tokio::test]
async fn test_deregister_needs_no_cluster_access() {
    // Fails on configuration before any Kubernetes or remote call
    let err = deregister(LabConfig::new("lab.example.com"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("missing endpoint"));
}

#[tokio::test]
async fn test_register_reports_missing_credential_first() {
    let mut config = LabConfig::new("lab.example.com");
    config.registration.endpoint = Some("https://rancher.invalid/v3".to_string());

    let err = register(config).await.unwrap_err();

    assert!(err.to_string().contains("missing token"));
}
