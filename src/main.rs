//! Cache Server - A sharded in-memory cache server
//!
//! Serves the cache engine over the binary TCP protocol or over HTTP,
//! depending on `SERVER_TYPE`.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_server::api::create_router;
use cache_server::{
    spawn_dump_task, spawn_gc_task, AppState, CacheEngine, Config, ServerType, TcpServer,
};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Restore the engine from the dump file, or start empty
/// 4. Start background GC and dump tasks
/// 5. Serve the configured front end
/// 6. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: server_type={:?}, address={}, shards={}, max_memory={}MB, gc_interval={}s, dump_interval={}s",
        config.server_type,
        config.server_address,
        config.cache.shard_count,
        config.cache.max_memory_mb,
        config.cache.gc_interval_secs,
        config.cache.dump_interval_secs
    );

    let engine = Arc::new(
        CacheEngine::open(config.cache.clone())
            .await
            .context("failed to initialize cache engine")?,
    );
    info!("Cache engine initialized with {} entries", engine.status().await.count);

    let background = vec![
        spawn_gc_task(Arc::clone(&engine), config.cache.gc_interval_secs),
        spawn_dump_task(Arc::clone(&engine), config.cache.dump_interval_secs),
    ];
    info!("Background tasks started");

    match config.server_type {
        ServerType::Tcp => {
            let server = TcpServer::new(Arc::clone(&engine));
            let closer = server.clone();
            tokio::spawn(async move {
                shutdown_signal(background).await;
                closer.close();
            });

            server
                .run(&config.server_address)
                .await
                .context("tcp server failed")?;
        }
        ServerType::Http => {
            let app = create_router(AppState::new(Arc::clone(&engine)));
            let listener = tokio::net::TcpListener::bind(&config.server_address)
                .await
                .with_context(|| format!("failed to bind {}", config.server_address))?;
            info!("Server listening on http://{}", config.server_address);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(background))
                .await
                .context("http server failed")?;
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the background tasks and allows graceful shutdown.
async fn shutdown_signal(background: Vec<JoinHandle<()>>) {
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for handle in background {
        handle.abort();
    }
    warn!("Background tasks aborted");
}
