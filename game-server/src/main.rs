use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use game_persistence::connection::connect_and_migrate;
use game_persistence::{DocumentStore, MemoryDocumentStore, SqlDocumentStore};
use game_server::{
    auth::AuthService,
    config::Config,
    create_routes,
    game_manager::GameManager,
    websocket::{ConnectionManager, RateLimit},
};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Guess the Word server...");

    let config = Config::from_env().context("invalid configuration")?;

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let db = connect_and_migrate(url).await?;
            Arc::new(SqlDocumentStore::new(db))
        }
        None => {
            info!("DATABASE_URL not set, keeping sessions in memory");
            Arc::new(MemoryDocumentStore::new())
        }
    };

    let auth_service = match (&config.jwt_secret, config.auth_dev_mode) {
        (_, true) => {
            info!("Starting in development authentication mode - JWT validation disabled");
            Arc::new(AuthService::new_dev_mode())
        }
        (Some(secret), false) => Arc::new(AuthService::new(secret)),
        (None, false) => anyhow::bail!("JWT_SECRET is required unless AUTH_DEV_MODE=true"),
    };

    let connection_manager = Arc::new(ConnectionManager::new());
    let game_manager = Arc::new(GameManager::new(store, &config));
    let rate_limit = RateLimit {
        max_messages: config.rate_limit_max_messages,
        refill_interval: Duration::from_millis(config.rate_limit_refill_ms),
    };

    let routes = create_routes(
        connection_manager.clone(),
        game_manager.clone(),
        auth_service,
        rate_limit,
    );

    // Start cleanup task
    let cleanup_config = config.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            connection_manager.cleanup_inactive_connections(cleanup_config.connection_timeout());
            if let Err(e) = game_manager
                .cleanup_stale_sessions(cleanup_config.session_max_age())
                .await
            {
                error!("Stale session sweep failed: {}", e);
            }
        }
    });

    let ip: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("invalid HOST {}", config.host))?;
    info!("Server starting on {}:{}", ip, config.port);

    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown((ip, config.port), shutdown_signal())
        .context("failed to bind server address")?;

    info!("Server started successfully on {}. Press Ctrl+C to stop.", addr);
    server.await;
    info!("Server shutdown complete.");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM (Ctrl+C elsewhere).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let (Ok(mut sigint), Ok(mut sigterm)) = (
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
            signal::unix::signal(signal::unix::SignalKind::terminate()),
        ) else {
            error!("Failed to install signal handlers, falling back to Ctrl+C");
            let _ = signal::ctrl_c().await;
            return;
        };

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }
}
