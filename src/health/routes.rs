//! Health route handlers.
//!
//! State is a snapshot taken at startup and never mutated, so handlers
//! share nothing with the execution pipeline.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::AppConfig;

pub type AppState = Arc<HealthInfo>;

/// Process facts reported by `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthInfo {
    pub engine: String,
    pub version: String,
    /// `LIVE` or `DRY_RUN`.
    pub mode: String,
    pub keys_detected: bool,
    pub telegram_active: bool,
    pub networks: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl HealthInfo {
    pub fn new(
        engine: &str,
        dry_run: bool,
        keys_detected: bool,
        telegram_active: bool,
        networks: Vec<String>,
    ) -> Self {
        Self {
            engine: engine.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: if dry_run { "DRY_RUN" } else { "LIVE" }.to_string(),
            keys_detected,
            telegram_active,
            networks,
            started_at: Utc::now(),
        }
    }

    /// Snapshot taken from configuration alone, before any credential is
    /// resolved, so a keyless process still reports itself.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            &cfg.agent.name,
            cfg.agent.dry_run,
            cfg.keys_detected(),
            cfg.telegram_token().is_some(),
            cfg.networks.iter().map(|n| n.name.clone()).collect(),
        )
    }
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn get_status(State(state): State<AppState>) -> Json<HealthInfo> {
    Json(state.as_ref().clone())
}
