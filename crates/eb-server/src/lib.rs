//! eb-server: the HTTP front door and the job service.
//!
//! - Axum router accepting encode requests directly or as Dapr CloudEvents
//! - Job service tying the orchestrator to storage upload, source purge and
//!   notifications
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod job;
pub mod notifier;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use eb_core::config::Config;

use crate::context::AppContext;

/// Start the front door and serve until a shutdown signal arrives or
/// `cancel` is triggered.
///
/// In-flight jobs run under child tokens of `cancel`, so shutdown stops
/// their encoders before the server returns.
pub async fn start(config: Config, cancel: CancellationToken) -> eb_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let tools = Arc::new(eb_av::ToolRegistry::discover(&config.tools));
    for info in tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| eb_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::from_config(config, tools, cancel.clone())?;
    let app = router::build_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| eb_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Starting server on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .map_err(|e| eb_core::Error::Internal(format!("Server error: {e}")))?;

    cancel.cancel();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for SIGINT, SIGTERM or `cancel`, then cancel `cancel` so in-flight
/// jobs stop.
pub async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
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
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = cancel.cancelled() => {}
    }

    tracing::info!("Shutdown signal received");
    cancel.cancel();
}
