//! glucolog-api - Main entry point
//!
//! Starts the ingestion scheduler and the HTTP API server. The scheduler
//! runs as a supervised background task and is cancelled at shutdown; the
//! two share the database pool and the change-event bus.

use anyhow::{Context, Result};
use clap::Parser;
use glucolog_api::{build_router, AppState, Ingestor, EVENT_BUS_CAPACITY};
use glucolog_common::config::{
    self, database_path, load_service_config, resolve_root_folder, token_path,
};
use glucolog_common::db::init_database;
use glucolog_common::events::EventBus;
use glucolog_api::libre::{LibreClient, TokenCache};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

/// Command-line arguments for glucolog-api
#[derive(Parser, Debug)]
#[command(name = "glucolog-api")]
#[command(about = "Glucose ingestion and query service")]
#[command(version)]
struct Args {
    /// Root folder holding config.toml, the database, and the token file
    #[arg(short, long, env = config::ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Bind address override (defaults to the configured bind_address)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting glucolog-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = resolve_root_folder(args.root_folder.as_deref());
    std::fs::create_dir_all(&root_folder)
        .with_context(|| format!("failed to create root folder {}", root_folder.display()))?;
    info!("Root folder: {}", root_folder.display());

    let service_config = load_service_config(&root_folder).context("configuration error")?;
    let bind_address = args.bind.unwrap_or_else(|| service_config.bind_address.clone());

    let db = init_database(&database_path(&root_folder))
        .await
        .context("failed to initialize database")?;

    let events = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));

    let tokens = TokenCache::new(&service_config.libre, token_path(&root_folder))
        .context("failed to construct token cache")?;
    let client =
        LibreClient::new(&service_config.libre).context("failed to construct remote client")?;

    let ingestor = Arc::new(Ingestor::new(
        db.clone(),
        events.clone(),
        tokens,
        client,
        Duration::from_secs(service_config.poll_interval_secs),
    ));

    // Supervised background ingestion task
    let ingest_task = tokio::spawn({
        let ingestor = ingestor.clone();
        async move { ingestor.run().await }
    });

    let state = AppState::new(db, events, ingestor);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind to {bind_address}"))?;
    info!("glucolog-api listening on http://{bind_address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Cancel ingestion at process shutdown
    ingest_task.abort();
    info!("Server shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
