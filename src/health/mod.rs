//! Liveness responders for container orchestration.
//!
//! Two interchangeable variants answer `{"status":"ok"}`:
//! - [`framework`]: axum router, any `GET` is healthy.
//! - [`raw`]: hand-rolled accept/parse/respond on `std::net`, only
//!   `GET /health` is healthy and everything else is a 404.

pub mod framework;
pub mod raw;

use std::io;

/// Body of every healthy response.
pub const HEALTH_BODY: &str = r#"{"status":"ok"}"#;

/// Body of the raw responder's 404.
pub const NOT_FOUND_BODY: &str = "Not Found";

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("cannot bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] io::Error),
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down health server"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down health server"),
    }
}
