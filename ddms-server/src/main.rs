//! DDMS server entry point.
//!
//! Boots the reconciliation engine (store broker, initial walk, filesystem
//! watch) and the axum query surface, then runs until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ddms_config::{Config, load_from_env, load_from_file, validate};
use ddms_core::store;
use ddms_core::watch::WatchService;
use ddms_core::{IndexEngine, store::broker};
use ddms_server::{AppState, routes};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "ddms-server")]
#[command(about = "Document index server with live filesystem reconciliation")]
struct Cli {
    /// Path to a TOML or JSON config file (overrides env discovery)
    #[arg(short, long, env = "DDMS_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Server port (overrides config)
    #[arg(short, long, env = "DDMS_PORT")]
    port: Option<u16>,

    /// Server host (overrides config)
    #[arg(long, env = "DDMS_HOST")]
    host: Option<String>,

    /// Run one reconciliation walk and exit without serving
    #[arg(long, default_value_t = false)]
    walk_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "info,ddms_core=info,ddms_server=info,tower_http=warn".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Arc::new(effective_config(&cli)?);

    for warning in validate(&config).context("configuration rejected")? {
        warn!("config: {warning}");
    }
    info!(
        root = %config.index.root_directory.display(),
        database = %config.index.database_path().display(),
        "starting ddms"
    );

    // Single-owner store coordinator.
    let conn = store::open(&config.index.database_path())
        .await
        .context("failed to open index database")?;
    let (store, broker_task) = broker::spawn(
        conn,
        Duration::from_millis(config.index.reply_timeout_ms),
    );

    let engine = IndexEngine::new(Arc::clone(&config), store.clone());

    // Bring the index into agreement with the live tree before (and
    // regardless of) serving.
    let summary = engine.run_walk().await.context("initial walk failed")?;
    info!(?summary, "initial reconciliation complete");
    if cli.walk_only {
        drop(engine);
        drop(store);
        broker_task.await.ok();
        return Ok(());
    }

    // Live pipeline: watcher -> normalizer -> coalescing buffer -> resolver.
    let (descriptor_tx, descriptor_rx) = mpsc::channel(config.watch.channel_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pump = engine.spawn_pump(descriptor_rx, shutdown_rx);
    let watcher =
        WatchService::start(&config, descriptor_tx).context("failed to start filesystem watch")?;

    let state = AppState::new(store.clone(), Arc::clone(&config));
    let app = routes::router(state);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid host/port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    // Shutdown order matters: stop producing notifications first, then let
    // the pump exit, then release the store connection.
    watcher.stop().await;
    shutdown_tx.send(true).ok();
    pump.await.ok();
    drop(engine);
    drop(store);
    broker_task.await.ok();
    info!("ddms stopped");

    Ok(())
}

fn effective_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let (config, source) = load_from_env().context("failed to load config")?;
            info!(?source, "configuration resolved");
            config
        }
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    Ok(config)
}
