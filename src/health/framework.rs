//! Health responder on axum.
//!
//! Every `GET`, whatever the path, gets `200 {"status":"ok"}`. Other methods
//! get `501`, as a stock request handler without a matching method would.

use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use super::{shutdown_signal, ServerError};

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
}

pub fn build_router() -> Router {
    Router::new()
        .fallback(health)
        .layer(TraceLayer::new_for_http())
}

async fn health(method: Method) -> Response {
    if method == Method::GET {
        Json(HealthStatus { status: "ok" }).into_response()
    } else {
        (
            StatusCode::NOT_IMPLEMENTED,
            [(header::CONTENT_TYPE, "text/plain")],
            "Unsupported method",
        )
            .into_response()
    }
}

/// Bind `host:port` and serve until Ctrl+C or SIGTERM.
pub async fn start(host: &str, port: u16) -> Result<(), ServerError> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!("health server listening on http://{}", addr);

    axum::serve(listener, build_router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
