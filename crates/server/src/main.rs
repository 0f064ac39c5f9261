use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brakeweb_core::{load_config, validate_config, Engine, HandbrakeEngine, CONFIG_PATH_ENV};
use brakeweb_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file picked up from the working directory when no path is given.
const DEFAULT_CONFIG_FILE: &str = "brakeweb.toml";

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

    info!("Starting brakeweb {}", VERSION);

    // Determine config path: explicit, else the default file if present
    let config_path = match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            default.exists().then_some(default)
        }
    };

    // Load configuration
    match &config_path {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No configuration file, using defaults and environment"),
    }
    let config = load_config(config_path.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Environment: {:?}", config.environment);
    info!("Jobs directory: {:?}", config.storage.jobs_dir);
    info!("Upload directory: {:?}", config.storage.upload_dir);

    tokio::fs::create_dir_all(&config.storage.jobs_dir)
        .await
        .with_context(|| format!("Failed to create jobs directory {:?}", config.storage.jobs_dir))?;
    tokio::fs::create_dir_all(&config.storage.upload_dir)
        .await
        .with_context(|| {
            format!("Failed to create upload directory {:?}", config.storage.upload_dir)
        })?;

    // Create engine; a missing binary only fails the requests that need it
    let engine = HandbrakeEngine::new(config.engine.clone());
    match engine.validate().await {
        Ok(()) => info!("Using HandBrakeCLI at {:?}", config.engine.binary_path),
        Err(e) => warn!("HandBrakeCLI is not usable, conversions will fail: {}", e),
    }
    info!(
        "Running at most {} transcode tasks at once",
        config.engine.max_concurrent_tasks
    );
    let engine: Arc<dyn Engine> = Arc::new(engine);

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), engine));

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

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
