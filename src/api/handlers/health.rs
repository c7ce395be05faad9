//! Service info and health report

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::detection::Capabilities;
use crate::segmentation::{models, CacheStatus};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<&'static str>,
    pub models: Vec<&'static str>,
}

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "Background Removal API",
        version: env!("CARGO_PKG_VERSION"),
        description: "Remove image backgrounds with content-aware segmentation models",
        endpoints: vec![
            "GET /health",
            "POST /api-keys",
            "GET /api-keys",
            "DELETE /api-keys/{id}",
            "POST /auth/register",
            "POST /auth/login",
            "GET /auth/me",
            "POST /remove-background",
        ],
        models: models::names(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    /// Resident set size, when the platform exposes it
    pub memory_mb: Option<f64>,
    pub capabilities: Capabilities,
    pub models: CacheStatus,
}

/// Resident memory from `/proc/self/statm`, assuming 4 KiB pages
async fn resident_memory_mb() -> Option<f64> {
    let statm = tokio::fs::read_to_string("/proc/self/statm").await.ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some((pages * 4096) as f64 / (1024.0 * 1024.0))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let models = state.sessions.status();
    let status = if models.loaded.is_empty() && !models.failed.is_empty() {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        memory_mb: resident_memory_mb().await,
        capabilities: state.capabilities,
        models,
    })
}
