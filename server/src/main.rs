mod app;
mod args;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams, LeaseLockResult};
use owo_colors::OwoColorize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use capacity_kubescaler::{ConfigManager, ConfigMapFile, Engine, FsFile, PersistentFile};

use crate::app::App;
use crate::args::Args;

const DEFAULT_CONFIG_PATH: &str = "/etc/kubescaler.conf";
const LEASE_NAME: &str = "capacity-server-lock";
const LEASE_TTL: Duration = Duration::from_secs(15);
const RENEW_EVERY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    capacity_common::init();
    owo_colors::set_override(args.log_format != "json");
    capacity_common::metrics::maybe_spawn_metrics_server();
    println!(
        "{}{}",
        "🚀 capacity-server starting • log-level=".green(),
        args.log_level.green().dimmed()
    );

    let client = build_client(&args).await?;
    let file = config_file(&args, client.clone());
    println!("{}{}", "📄 config source: ".green(), file.info().green().dimmed());

    let config_manager = Arc::new(ConfigManager::new(file).await.context("failed to set up config manager")?);
    let engine = Arc::new(
        Engine::new(client.clone(), config_manager)
            .await
            .context("failed to build reconciliation engine")?,
    );

    let shutdown = CancellationToken::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        capacity_common::shutdown::shutdown_signal().await;
        shutdown_for_signal.cancel();
    });

    let leadership = tokio::spawn(run_leader_election(client, engine.clone(), shutdown.clone()));

    let app = App::new(engine);
    let listener = TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;
    println!(
        "{}{}",
        "🌐 listening • addr=".green(),
        args.listen_addr.green().dimmed()
    );
    axum::serve(listener, routes::router(app))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server failed")?;

    leadership.await.ok();
    println!("{}", "🛑 capacity-server stopped gracefully".red());
    Ok(())
}

async fn build_client(args: &Args) -> Result<Client> {
    if let Some(path) = &args.kubeconfig {
        let kubeconfig = kube::config::Kubeconfig::read_from(path).context("failed to read kubeconfig")?;
        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default()).await?;
        Ok(Client::try_from(config)?)
    } else {
        Ok(Client::try_default().await.context("failed to build Kubernetes client")?)
    }
}

/// Resolves the config backing store: an explicit file path, falling back to the
/// cluster ConfigMap, falling back to the default on-disk path.
fn config_file(args: &Args, client: Client) -> Box<dyn PersistentFile> {
    if let Some(path) = &args.kubescaler_config {
        return Box::new(FsFile::new(path));
    }
    if !args.configmap_name.is_empty() {
        return Box::new(ConfigMapFile::new(
            client,
            args.configmap_namespace.clone(),
            args.configmap_name.clone(),
            "kubescaler.conf",
        ));
    }
    Box::new(FsFile::new(DEFAULT_CONFIG_PATH))
}

/// Only the leader runs the reconciliation loop; every replica serves HTTP regardless.
/// Grounded on the cluster controller's lease-renewal loop: acquire-or-renew on a fixed
/// interval, spawning the loop on acquisition and aborting it on loss.
async fn run_leader_election(client: Client, engine: Arc<Engine>, shutdown: CancellationToken) {
    let namespace = std::env::var("NAMESPACE").unwrap_or_else(|_| "default".to_string());
    let holder_id = std::env::var("POD_NAME")
        .or_else(|_| std::env::var("HOSTNAME"))
        .unwrap_or_else(|_| format!("capacity-server-{}", uuid::Uuid::new_v4()));
    let leadership = LeaseLock::new(
        client,
        &namespace,
        LeaseLockParams {
            holder_id,
            lease_name: LEASE_NAME.to_string(),
            lease_ttl: LEASE_TTL,
        },
    );

    let mut reconcile_task: Option<tokio::task::JoinHandle<()>> = None;
    let mut tick = tokio::time::interval(RENEW_EVERY);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                if let Some(task) = reconcile_task.take() {
                    task.abort();
                    task.await.ok();
                }
                return;
            }
            _ = tick.tick() => {}
        }

        let lease = match leadership.try_acquire_or_renew().await {
            Ok(l) => l,
            Err(e) => {
                eprintln!("leader election renew/acquire failed: {e}");
                if let Some(task) = reconcile_task.take() {
                    task.abort();
                }
                continue;
            }
        };

        if matches!(lease, LeaseLockResult::Acquired(_)) {
            if reconcile_task.is_none() {
                println!("{}", "👑 acquired leadership; starting reconciliation loop".green());
                let engine = engine.clone();
                let shutdown = shutdown.clone();
                reconcile_task = Some(tokio::spawn(async move { engine.run(shutdown).await }));
            }
        } else if let Some(task) = reconcile_task.take() {
            eprintln!("lost leadership; stopping reconciliation loop");
            task.abort();
        }
    }
}
