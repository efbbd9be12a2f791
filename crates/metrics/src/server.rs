//! The `/metrics` HTTP endpoint shared by `ticker` and `consumer` (§6 CLI
//! surface: both "start HTTP metrics server on :8000").

use std::net::SocketAddr;

use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use axum::http::StatusCode;
use tokio::net::TcpListener;

use crate::encode_metrics;

async fn metrics() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("failed to encode metrics: {e}"),
        ),
    }
}

pub fn create_router() -> Router {
    Router::new().route("/metrics", get(metrics))
}

/// Bind and serve the metrics router until the process exits.
pub async fn run_metrics_server(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, create_router()).await
}
