//! SchemaHeal control surface
//!
//! HTTP endpoints over a running [`HealthMonitor`]: status, issues, scan
//! requests, fix preview and application, and monitoring switches.

pub mod error;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::router;

use schemaheal_engine::HealthMonitor;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serve the control surface until the monitor shuts down
pub async fn serve(monitor: HealthMonitor, addr: &str) -> Result<(), ServerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    tracing::info!(addr = %listener.local_addr()?, "control surface listening");

    let shutdown = monitor.shutdown_token();
    axum::serve(listener, router(monitor))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("control surface stopped");
    Ok(())
}
