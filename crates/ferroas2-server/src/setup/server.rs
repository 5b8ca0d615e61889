//! Server startup and graceful shutdown

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{Extension, Router};
use ferroas2_core::ServerConfig;
use ferroas2_worker::DirectoryWatcher;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::App;
use crate::handlers::LocalAddr;

async fn bind(host: &str, port: u16) -> Result<(TcpListener, SocketAddr)> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let local = listener.local_addr()?;
    Ok((listener, local))
}

async fn serve(
    listener: TcpListener,
    router: Router,
    local: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app = router
        .layer(Extension(LocalAddr(local)))
        .into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;
    Ok(())
}

/// Start both listeners plus the outbox scheduler and run until a shutdown signal.
pub async fn start_server(config: &ServerConfig, app: App) -> Result<()> {
    let (file_listener, file_addr) = bind(&config.host, config.port).await?;
    let (mdn_listener, mdn_addr) = bind(&config.host, config.mdn_port).await?;

    let scheduler = app
        .scheduler
        .clone()
        .spawn(Duration::from_secs(config.send_interval_secs));
    let watcher = DirectoryWatcher::new(app.scheduler.clone())
        .spawn(Duration::from_secs(config.scan_interval_secs));

    tracing::info!(
        file_addr = %file_addr,
        mdn_addr = %mdn_addr,
        async_mdn_url = %config.async_mdn_url(),
        send_interval_secs = config.send_interval_secs,
        scan_interval_secs = config.scan_interval_secs,
        "Server ready and accepting connections"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let served = tokio::try_join!(
        serve(file_listener, app.file_router, file_addr, shutdown_rx.clone()),
        serve(mdn_listener, app.mdn_router, mdn_addr, shutdown_rx),
    );

    scheduler.shutdown().await;
    watcher.shutdown().await;
    ferroas2_infra::shutdown_telemetry().await;

    served.map(|_| ())
}

/// Signal handler for graceful shutdown
///
/// Listens for Ctrl+C (SIGINT) and SIGTERM.
///
/// # Panics
/// Panics if a signal handler cannot be installed (unrecoverable system error).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
