//! Locus location server - main entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use locus_common::config::{self, ROOT_FOLDER_ENV};
use locus_server::engine::PathLossModel;
use locus_server::state::SharedState;
use locus_server::{build_router, db, load_engine, scheduler, AppState};

/// Command-line arguments for locus-server
#[derive(Parser, Debug)]
#[command(name = "locus-server")]
#[command(about = "RSSI indoor location server")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/locus/config.toml or /etc/locus/config.toml)
    #[arg(short, long, env = "LOCUS_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding locus.db
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(short, long, env = "LOCUS_BIND_ADDRESS")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "LOCUS_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: the log filter may come from it
    let (toml_config, config_source) =
        config::load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "locus_server={level},locus_common={level},tower_http={level}",
                    level = toml_config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting locus-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE"),
    );

    match &config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => warn!("No config file found, using defaults"),
    }

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, &toml_config);
    config::ensure_directory_exists(&root_folder).context("Failed to create root folder")?;
    info!("Root folder: {}", root_folder.display());

    let db_path = config::database_path(&root_folder);
    let pool = locus_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let model = PathLossModel::from(toml_config.path_loss);
    info!(
        "Path-loss model: {} dBm at 1 m, exponent {}",
        model.tx_power_at_1m, model.exponent
    );
    let engine = load_engine(&pool, model)
        .await
        .context("Failed to restore state from database")?;

    let (persistence, writer_task) = db::spawn_writer(pool.clone());
    let shared = Arc::new(SharedState::new(engine, persistence.clone()));
    let eviction_task = scheduler::spawn_eviction_task(shared.clone(), toml_config.eviction);

    let shutdown = shared.shutdown_token();
    let app = build_router(AppState::new(shared));

    let bind_address = args.bind.as_deref().unwrap_or(toml_config.bind_address());
    let port = args.port.unwrap_or(toml_config.port());
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind_address, port))?;

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open SSE streams would otherwise hold the server open
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    if let Err(e) = eviction_task.await {
        error!("Eviction task ended abnormally: {}", e);
    }

    // Let queued writes land before closing the pool
    persistence.flush().await;
    writer_task.abort();
    pool.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
