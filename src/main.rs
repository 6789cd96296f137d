//! Static Cache - A static file server with an in-memory response cache
//!
//! Binary entry point: configuration from the environment, background tasks,
//! and the HTTP server with graceful shutdown.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use static_cache::api::{create_router, AppState};
use static_cache::{spawn_invalidator, spawn_sweep_task, ByteCache, Config, FileServer};

/// Main entry point for the static file server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the byte cache with configured limits
/// 4. Start the file watch invalidator and the TTL sweep task
/// 5. Create Axum router
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "static_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Static Cache file server");

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        "Configuration loaded: root={}, mount={}, port={}, cache_enabled={}, max_entries={}, max_bytes={}, ttl={}s",
        config.root.display(),
        config.mount,
        config.server_port,
        config.cache_enabled,
        config.cache.max_entries,
        config.cache.max_bytes,
        config.cache.ttl.as_secs()
    );

    let cache = ByteCache::new(config.cache.clone());
    let mut server = FileServer::new(&config, cache.clone()).context("Cannot serve root directory")?;
    info!("Serving files from {}", server.root().display());

    let mut tasks = Vec::new();
    if config.cache_enabled && config.watch_files {
        let (invalidator, handle) =
            spawn_invalidator(cache.clone()).context("Cannot start file watcher")?;
        server = server.with_invalidator(invalidator);
        tasks.push(handle);
        info!("File watch invalidator started");
    }

    tasks.push(spawn_sweep_task(cache, config.sweep_interval));
    info!("Background sweep task started");

    let app = create_router(AppState::new(server));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(tasks))
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background tasks and allows graceful shutdown.
async fn shutdown_signal(tasks: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for task in &tasks {
        task.abort();
    }
    warn!("Background tasks aborted");
}
