//! Ticket platform HTTP server.
//!
//! Session validation, realtime notifications and background tasks behind
//! one axum router.

use anyhow::Context;
use std::sync::Arc;
use ticket_auth::stores::{PostgresTokenVersionStore, RedisSessionCache};
use ticket_auth::{SessionService, TokenService};
use ticket_notify::Hub;
use ticket_runtime::{AppTaskHandler, RedisTaskQueue, SmtpMailer, TaskProcessor, TaskQueue};
use ticket_server::Config;
use ticket_server::startup::{connect_postgres, connect_redis, shutdown_signal};
use ticket_web::{AppState, router};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the real environment still applies.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticket_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ticket server");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(?config, "Configuration loaded");

    let redis = connect_redis(&config.redis.url)
        .await
        .context("Failed to connect to Redis")?;
    let pool = connect_postgres(&config.postgres)
        .await
        .context("Failed to connect to PostgreSQL")?;

    let tokens = TokenService::new(config.token_config()).context("Invalid token configuration")?;
    let sessions = Arc::new(SessionService::new(
        tokens,
        Arc::new(RedisSessionCache::from_manager(redis.clone())),
        Arc::new(PostgresTokenVersionStore::new(pool.clone())),
    ));
    let hub = Arc::new(Hub::with_config(config.hub_config()));
    let queue: Arc<dyn TaskQueue> = Arc::new(RedisTaskQueue::from_manager(redis));

    let mailer = SmtpMailer::new(&config.smtp_config()).context("Invalid SMTP configuration")?;
    let handler = Arc::new(AppTaskHandler::new(Arc::new(mailer), Arc::clone(&hub)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let processor = TaskProcessor::new(Arc::clone(&queue), handler, config.processor_config());
    info!(
        queue = %processor.config().queue,
        concurrency = processor.config().concurrency,
        "Starting task processor"
    );
    let workers = tokio::spawn(processor.run(shutdown_rx.clone()));

    let state = AppState::new(sessions, hub, queue).with_enqueue_options(config.enqueue_options());
    let app = router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Server listening");

    let mut server_shutdown = shutdown_rx;
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    tokio::select! {
        () = shutdown_signal() => {}
        result = &mut server => {
            // Only reachable if the listener fails before any signal.
            let _ = shutdown_tx.send(true);
            pool.close().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).context("HTTP server failed"),
                Err(e) => Err(e).context("HTTP server task failed"),
            };
        }
    }

    let _ = shutdown_tx.send(true);

    let drain = async {
        match server.await {
            Ok(Ok(())) => info!("HTTP server stopped"),
            Ok(Err(e)) => error!(error = %e, "HTTP server failed during shutdown"),
            Err(e) => error!(error = %e, "HTTP server task failed"),
        }
        match workers.await {
            Ok(Ok(())) => info!("Task processor stopped"),
            Ok(Err(e)) => error!(error = %e, "Task processor failed"),
            Err(e) => error!(error = %e, "Task processor task failed"),
        }
    };

    if tokio::time::timeout(config.shutdown_timeout(), drain).await.is_err() {
        warn!(
            timeout_secs = config.server.shutdown_timeout,
            "Shutdown timed out, exiting with work in flight"
        );
    }

    pool.close().await;
    info!("Server stopped");
    Ok(())
}
