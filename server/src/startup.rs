//! Startup helpers: backend connections and the shutdown signal.

use crate::config::PostgresConfig;
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use ticket_runtime::retry::{Backoff, retry_with_backoff};
use tokio::signal;
use tracing::{error, info};

/// Attempts per backend before startup gives up.
pub const CONNECT_ATTEMPTS: u32 = 6;

/// Backoff for initial backend connections (containers may still be starting).
#[must_use]
pub const fn connect_backoff() -> Backoff {
    Backoff::new(Duration::from_millis(500), Duration::from_secs(10))
}

/// Open the Redis connection shared by the session cache and the task queue.
///
/// # Errors
///
/// Returns the last Redis error after [`CONNECT_ATTEMPTS`] failures.
pub async fn connect_redis(url: &str) -> Result<ConnectionManager, redis::RedisError> {
    let client = redis::Client::open(url)?;

    let manager = retry_with_backoff(connect_backoff(), CONNECT_ATTEMPTS, || {
        ConnectionManager::new(client.clone())
    })
    .await?;

    info!("Redis connected");
    Ok(manager)
}

/// Open the `PostgreSQL` pool backing the token version store.
///
/// # Errors
///
/// Returns the last `sqlx` error after [`CONNECT_ATTEMPTS`] failures.
pub async fn connect_postgres(config: &PostgresConfig) -> Result<PgPool, sqlx::Error> {
    let pool = retry_with_backoff(connect_backoff(), CONNECT_ATTEMPTS, || {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
    })
    .await?;

    info!(max_connections = config.max_connections, "PostgreSQL connected");
    Ok(pool)
}

/// Resolves on Ctrl+C or SIGTERM.
///
/// A handler that fails to install is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
