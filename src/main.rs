//! Resource Cache server
//!
//! Runs the cache engine behind an HTTP API with persistence, behavior
//! recording and background prefetching.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resource_cache::api::create_router;
use resource_cache::behavior::BehaviorRecorder;
use resource_cache::clock::SystemClock;
use resource_cache::fetch::HttpFetcher;
use resource_cache::storage::{FileBackend, PersistentStore};
use resource_cache::{
    spawn_flush_task, spawn_prefetch_workers, spawn_stats_snapshot_task, AppState, CacheEngine,
    Config,
};

/// Main entry point for the resource cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the persistent store and restore entries, stats and history
/// 4. Start flush, stats snapshot and prefetch tasks
/// 5. Serve the Axum router until SIGINT/SIGTERM
/// 6. Flush history and stats, then stop background tasks
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resource_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resource Cache Server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: port={}, upstream={}, data_dir={}, prefetch_workers={}",
        config.server_port,
        config.upstream_origin,
        config.data_dir.display(),
        config.prefetch_workers
    );

    let strategies = config
        .strategy_table()
        .context("failed to load strategy table")?;
    info!("Loaded {} cache strategies", strategies.len());

    let store = PersistentStore::new(Arc::new(FileBackend::new(config.data_dir.clone())));
    let clock = Arc::new(SystemClock);
    let engine = CacheEngine::new(
        strategies,
        Arc::new(HttpFetcher::new(config.upstream_origin.clone())),
        clock.clone(),
        store.clone(),
        config.engine_options(),
    );
    engine.restore().await;

    let recorder = Arc::new(BehaviorRecorder::new(
        config.behavior_capacity,
        clock,
        store,
    ));
    recorder.restore().await;

    let state = AppState::new(engine.clone(), recorder.clone(), config.prefetch_options());

    let mut tasks = vec![
        spawn_flush_task(recorder.clone(), config.flush_interval()),
        spawn_stats_snapshot_task(engine.clone(), config.stats_snapshot_interval()),
    ];
    tasks.extend(spawn_prefetch_workers(
        state.scheduler.clone(),
        config.prefetch_workers,
    ));
    info!("Background tasks started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Final flushes before the tasks go away
    recorder.flush().await;
    engine.persist_stats().await;
    stop_tasks(tasks);

    info!("Server shutdown complete");
    Ok(())
}

fn stop_tasks(tasks: Vec<JoinHandle<()>>) {
    for task in &tasks {
        task.abort();
    }
    warn!("Aborted {} background tasks", tasks.len());
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
}
