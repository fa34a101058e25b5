//! Health surface: a minimal HTTP server for platform port checks.
//!
//! `GET /health` answers 200; `GET /status` returns the startup snapshot
//! as JSON. CORS enabled for browser probes.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{AppState, HealthInfo};

/// Bind `port` and serve in a background task.
///
/// Binding failures are returned; the server itself never blocks the caller.
pub async fn spawn_health(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health port {port}"))?;
    info!(port, "Health server listening on http://0.0.0.0:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Health server stopped");
        }
    });
    Ok(())
}

/// Port from `PORT` when set and valid, else `configured`.
pub fn resolve_port(configured: u16) -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(configured)
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/status", get(routes::get_status))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
