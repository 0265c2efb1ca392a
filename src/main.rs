use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use kube::Client;
use labctl::config::{default_candidates, resolve_config, ConfigSource, LabConfig};
use labctl::controller::{run_pass, Context, KubeRouteStore};
use labctl::registration::{KubeManifestApplier, Orchestrator};
use labctl::server::{create_metrics, run_health_server, ReadinessState};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default port for health endpoints in watch mode
const HEALTH_PORT: u16 = 8080;

#[derive(Debug, Parser)]
#[command(name = "labctl", about = "Lab cluster route reconciler and registration tool")]
struct Options {
    /// Configuration file; overrides the candidate search
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory searched for local/dev/staging/prod.toml
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one route reconciliation pass
    Reconcile,
    /// Reconcile periodically and serve health and metrics endpoints
    Watch {
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
        #[arg(long, default_value_t = HEALTH_PORT)]
        health_port: u16,
    },
    /// Register this cluster with the remote management API
    Register,
    /// Remove this cluster's objects from the remote management API
    Deregister,
}

/// Configuration sources in resolution order
fn config_sources(options: &Options) -> Vec<ConfigSource> {
    match &options.config {
        Some(path) => vec![ConfigSource::File(path.clone())],
        None => default_candidates(&options.config_dir),
    }
}

async fn kube_client() -> anyhow::Result<Client> {
    match Client::try_default().await {
        Ok(client) => {
            info!("Connected to Kubernetes cluster");
            Ok(client)
        }
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            Err(e.into())
        }
    }
}

async fn reconcile_once(config: LabConfig) -> anyhow::Result<()> {
    let client = kube_client().await?;
    let ctx = Context::new(Arc::new(KubeRouteStore::new(client)), config.routes);

    let summary = run_pass(&ctx).await?;
    println!("{}", summary);

    if !summary.is_success() {
        bail!("{} route(s) failed to apply", summary.failed());
    }
    Ok(())
}

async fn watch(config: LabConfig, interval_secs: u64, health_port: u16) -> anyhow::Result<()> {
    let readiness = ReadinessState::new();
    let metrics = create_metrics().context("failed to register metrics")?;

    let health_readiness = readiness.clone();
    let health_metrics = metrics.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(health_port, health_readiness, health_metrics).await {
            warn!(error = %e, "Health server failed");
        }
    });
    info!(port = health_port, "Health server task spawned");

    let client = kube_client().await?;
    let ctx = Context::new(Arc::new(KubeRouteStore::new(client)), config.routes)
        .with_metrics(metrics);

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    info!(interval_secs = interval_secs, "Starting periodic reconciliation");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Pass errors are logged and counted in run_pass; the next tick retries
                if run_pass(&ctx).await.is_ok() && !readiness.is_ready() {
                    readiness.set_ready();
                    info!("First reconciliation pass complete, marking ready");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                return Ok(());
            }
        }
    }
}

async fn register(config: LabConfig) -> anyhow::Result<()> {
    // Kubernetes access is only needed once the manifest is fetched
    let applier = KubeManifestApplier::new();

    match Orchestrator::new(config.registration).register(&applier).await {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            if let Some(cluster_id) = e.orphaned_cluster() {
                eprintln!(
                    "remote cluster object {} was left behind; run `labctl deregister` to remove it",
                    cluster_id
                );
            }
            Err(e.into())
        }
    }
}

/// Only the management API is contacted; no kubeconfig is required
async fn deregister(config: LabConfig) -> anyhow::Result<()> {
    let outcome = Orchestrator::new(config.registration).deregister().await?;
    println!("{}", outcome);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let options = Options::parse();
    let config = resolve_config(&config_sources(&options))?;
    info!(
        ingress_domain = %config.routes.ingress_domain,
        gateway = %config.routes.gateway,
        "Starting labctl"
    );

    match options.command {
        Command::Reconcile => reconcile_once(config).await,
        Command::Watch {
            interval_secs,
            health_port,
        } => watch(config, interval_secs, health_port).await,
        Command::Register => register(config).await,
        Command::Deregister => deregister(config).await,
    }
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
