use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use discvault_core::{
    create_notification_system, load_config, open_stores, validate_config, Emulator,
    ExportEmulator, Library, Notifier,
};
use discvault_server::api::create_router;
use discvault_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the notification channel
const NOTIFICATION_BUFFER_SIZE: usize = 1000;

/// Notifications kept for the API
const NOTIFICATION_HISTORY: usize = 200;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("DISCVAULT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Storage backend: {:?}", config.storage.backend);
    info!("Database path: {:?}", config.storage.database_path);

    // Open stores
    let stores = open_stores(&config.storage)
        .await
        .context("Failed to open library stores")?;
    info!("Chunk store initialized: {}", stores.chunks.name());

    // Create notification system
    let (notifier, notification_log, notification_writer) = create_notification_system(
        NOTIFICATION_HISTORY,
        NOTIFICATION_BUFFER_SIZE,
        Duration::from_millis(config.notifications.default_duration_ms),
    );
    let writer_handle = tokio::spawn(notification_writer.run());

    // Create emulator
    let emulator: Arc<dyn Emulator> = Arc::new(ExportEmulator::new(&config.emulator.export_dir));
    info!(
        "Using emulator: {} (export dir {:?})",
        emulator.name(),
        config.emulator.export_dir
    );

    let notifier: Arc<dyn Notifier> = Arc::new(notifier);
    let library = Arc::new(Library::new(
        config.install.clone(),
        stores.chunks,
        stores.catalog,
        emulator,
        notifier,
    ));

    // Nothing is installing yet, so any chunk set without a record is left
    // over from an interrupted install.
    let swept = library
        .sweep_orphans()
        .await
        .context("Failed to sweep orphaned chunks")?;
    if !swept.is_empty() {
        info!("Reclaimed storage of {} interrupted installs", swept.len());
    }

    match library.stats().await {
        Ok(stats) => info!("Library: {}", stats.summary()),
        Err(e) => error!("Failed to read library stats: {}", e),
    }

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&library),
        notification_log,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if let Err(e) = library.shutdown().await {
        error!("Failed to flush library: {}", e);
    }

    // The library holds the last notifier; dropping it closes the writer's channel.
    drop(library);
    let _ = writer_handle.await;
    info!("Notification writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
