use data_destruction_gateway::api::{router, AppState};
use data_destruction_gateway::config::Config;
use data_destruction_gateway::registry::ProtocolRegistry;
use data_destruction_gateway::store::PgStore;

use std::sync::Arc;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env file if present
    let dotenv_result = dotenvy::dotenv();

    let config = Config::from_env()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,data_destruction_gateway=debug"));

    // File output is optional; keep the guard alive for the process lifetime
    let (file_layer, _guard) = match &config.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).unwrap_or_else(|e| {
                eprintln!("Warning: Could not create log directory {}: {}", log_dir.display(), e);
            });
            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, log_dir, "data-destruction-gateway.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_writer(non_blocking);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        // Console output
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        // File output with JSON format for easy parsing
        .with(file_layer)
        .init();

    debug!("Logging initialized - log directory: {:?}", config.log_dir);

    if let Err(e) = dotenv_result {
        warn!("No .env file found or error loading it: {}", e);
    }

    let socket_addr = config.socket_addr()?;

    let registry = match &config.protocols_file {
        Some(path) => ProtocolRegistry::from_file(path)?,
        None => ProtocolRegistry::builtin(),
    };
    info!(
        "Registered protocols: {}",
        registry.names().collect::<Vec<_>>().join(", ")
    );

    // One pool for the process lifetime, shared by all requests
    let store = Arc::new(PgStore::connect(&config).await?);
    info!("Max store connections: {}", config.max_connections);
    info!("Max request body: {} bytes", config.max_body_bytes);

    let state = Arc::new(AppState::new(registry, store).with_max_body_bytes(config.max_body_bytes));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&socket_addr).await?;
    info!("Server listening on {}", socket_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
