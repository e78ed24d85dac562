mod api;
mod config;
mod db;
mod metrics;
mod processor;
mod watcher;

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use processor::EventProcessor;
use watcher::{ChainHandle, ChainWatcher};

/// How long watchers get to finish their in-flight window on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    tracing::info!("Starting Bridge Indexer");

    let config = Config::load()?;
    tracing::info!(
        chains = config.chains.len(),
        min_confirmations = config.min_confirmations,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let processor = Arc::new(EventProcessor::new(pool.clone()));
    let call_timeout = Duration::from_millis(config.poll_interval_ms);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = signal_tx.send(());
    });

    // Query API server.
    let api_addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let api_db = pool.clone();
    tokio::spawn(async move {
        if let Err(e) = api::start_api_server(api_addr, api_db).await {
            tracing::error!(error = %e, "API server error");
        }
    });

    // One watcher per chain.
    let mut tasks = tokio::task::JoinSet::new();
    for chain_config in &config.chains {
        let handle = Arc::new(ChainHandle::from_config(chain_config, call_timeout)?);
        let watcher = ChainWatcher::new(
            handle,
            pool.clone(),
            processor.clone(),
            Duration::from_millis(config.poll_interval_ms),
            config.min_confirmations,
            config.batch_size,
        );
        tasks.spawn(watcher.run(shutdown_tx.subscribe()));
    }

    tracing::info!("Indexer running");

    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        _ = shutdown_rx.recv() => {
            tracing::info!("Shutdown requested, draining tasks");
            let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
                while tasks.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                tracing::warn!(
                    grace_secs = SHUTDOWN_GRACE.as_secs(),
                    "Grace period elapsed, aborting remaining tasks"
                );
                tasks.abort_all();
            }
        }
        Some(result) = tasks.join_next() => {
            match result {
                Ok(Ok(())) => tracing::info!("A watcher exited cleanly"),
                Ok(Err(e)) => tracing::error!(error = %e, "A watcher failed"),
                Err(e) => tracing::error!(error = %e, "A watcher panicked"),
            }
            let _ = shutdown_tx.send(());
        }
    }

    metrics::UP.set(0.0);
    tracing::info!("Bridge Indexer stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_indexer=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
