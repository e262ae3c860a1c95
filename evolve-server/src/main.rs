use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod relay;
pub mod repository;
pub mod service;
pub mod state;

use config::ServerConfig;
use relay::{LogStoreClient, RedisLogStore};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = ServerConfig::from_env()?;
    init_tracing(config.json_logs);
    config.validate()?;

    tracing::info!("Starting Evolve server...");

    tracing::info!("Connecting to Redis...");
    let redis = RedisLogStore::connect(&config.redis_url)
        .await
        .context("Failed to initialize Redis client")?;
    tracing::info!("Redis client initialized");

    let pool = db::create_pool(&config.database_url).context("Invalid database URL")?;

    let auth = auth::HttpAuthVerifier::new(&config.auth_url)
        .context("Failed to create auth verifier client")?;

    let shutdown = CancellationToken::new();
    let state = AppState {
        pool,
        log_store: LogStoreClient::new(Arc::new(redis)),
        auth: Arc::new(auth),
        relay: config.relay.clone(),
        shutdown: shutdown.clone(),
    };

    let cors = api::cors_layer(&config.frontend_url).context("Invalid FRONTEND_URL")?;
    let app = api::create_router(state, cors);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(
        "Listening on {} (allowed frontend origin: {})",
        addr,
        config.frontend_url
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    tracing::info!("Server exiting");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "evolve_server=debug,tower_http=debug".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Resolves on SIGINT or SIGTERM after cancelling `shutdown`, which ends
/// every open log stream so the server can drain.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received, closing log streams");
    shutdown.cancel();
}
