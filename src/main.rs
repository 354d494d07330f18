use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use actiongate::api::routes::{create_router, AppState};
use actiongate::config::Config;
use actiongate::observability::{init_tracing, MetricsRegistry};
use actiongate::policy::{PolicyLoader, PolicyWatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting actiongate decision engine"
    );

    let metrics = Arc::new(MetricsRegistry::new());

    let loader = PolicyLoader::new(
        config.policy_path.to_string_lossy(),
        config.refdata_path.to_string_lossy(),
    )
    .with_env_prefix(config.refdata_env_prefix.clone());

    // Refuse to serve without a complete initial snapshot
    let watcher = PolicyWatcher::new(loader, config.policy_reload_interval())
        .with_metrics(metrics.clone());
    let (snapshot_rx, policy_handle) = watcher.start().map_err(|e| {
        error!(error = %e, "Failed to load initial policy");
        e
    })?;

    let state = Arc::new(AppState {
        snapshot_rx,
        metrics,
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        request_timeout: config.request_timeout(),
    });

    let app = create_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutting down...");
    policy_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Received shutdown signal");
}
