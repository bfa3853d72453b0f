//! Capacity router server.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │               CAPACITY ROUTER                │
//!   Invocation            │  ┌────────┐   ┌─────────┐   ┌────────────┐   │
//!   ──────────────────────┼─▶│  http  │──▶│ routing │──▶│    pool    │   │
//!                         │  │ server │   └────┬────┘   │  selector  │   │
//!                         │  └───┬────┘        │        └────────────┘   │
//!   PATCH / GET dimension │      │             ▼                         │
//!   status events ────────┼──────┴──────▶ ┌─────────┐   ┌────────────┐   │
//!                         │               │ scaling │──▶│   store    │   │
//!   reconciler tick ──────┼─────────────▶ │ service │   │ (counters, │   │
//!                         │               └────┬────┘   │ pool,state)│   │
//!                         │                    │        └────────────┘   │
//!                         │                    ▼                         │
//!                         │            scaling control plane ──────────┼──▶ endpoints
//!                         │                                              │
//!                         │  config (reload) · observability · lifecycle │
//!                         └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use capacity_router::config::{load_config, watcher, RouterConfig};
use capacity_router::http::{AppState, HttpServer};
use capacity_router::lifecycle::{wait_for_signal, Shutdown};
use capacity_router::observability::{logging, metrics};
use capacity_router::routing::WeightedRouter;
use capacity_router::scaling::{Reconciler, ScalingService};
use capacity_router::store::{HttpScalingControl, MemoryStore, RecordingControl, ScalingControl};

#[derive(Parser)]
#[command(name = "capacity-router")]
#[command(about = "Weighted request routing and capacity scaling service", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "capacity-router starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        pool = %config.store.config_id,
        staleness_timeout_secs = config.scaling.staleness_timeout_secs,
        reconcile_interval_secs = config.scaling.reconcile_interval_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = match &config.store.snapshot_path {
        Some(path) => MemoryStore::load_from_file(path)?,
        None => MemoryStore::new(),
    };

    let control: Arc<dyn ScalingControl> = match &config.control_plane.url {
        Some(url) => {
            tracing::info!(url = %url, "Using HTTP scaling control plane");
            Arc::new(HttpScalingControl::new(
                url,
                Duration::from_secs(config.control_plane.timeout_secs),
            )?)
        }
        None => {
            tracing::warn!("No control plane configured, scale requests are only logged");
            Arc::new(RecordingControl::new())
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let request_timeout = Duration::from_secs(config.listener.request_timeout_secs);
    let shared = watcher::shared(config);
    let shutdown = Shutdown::new();

    // Hot reload; the watcher stops when dropped at the end of main.
    let _watcher = match &args.config {
        Some(path) => {
            let (config_watcher, updates) = watcher::ConfigWatcher::new(path);
            tokio::spawn(watcher::apply_updates(shared.clone(), updates, shutdown.subscribe()));
            match config_watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start config watcher, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let router = WeightedRouter::new(Arc::new(store.clone()), Arc::new(store.clone()), shared.clone());
    let scaling = ScalingService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        control,
        shared.clone(),
    );

    let reconciler = tokio::spawn(
        Reconciler::new(scaling.clone(), shared.clone()).run(shutdown.subscribe()),
    );

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let server = HttpServer::new(AppState::new(router, scaling), request_timeout);
    let result = server.run(listener, shutdown.notified()).await;

    // The server may also stop on its own error; make sure everything else stops too.
    shutdown.trigger();
    if let Err(e) = reconciler.await {
        tracing::error!(error = %e, "Reconciler task failed");
    }

    if let Err(e) = store.save_to_file() {
        tracing::error!(error = %e, "Failed to save store snapshot");
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}
