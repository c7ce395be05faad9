//! API key management

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::credentials::ApiKey;
use crate::error::{AppError, Result};
use crate::AppState;

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Key management is open unless `auth.admin_token` is configured
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let Some(expected) = state.settings.auth.admin_token.as_deref() else {
        return Ok(());
    };

    match headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        None => Err(AppError::AuthenticationFailed("Admin token required".to_string())),
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(AppError::Forbidden("Invalid admin token".to_string())),
    }
}

pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<ApiKey>)> {
    require_admin(&state, &headers)?;

    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("API key name cannot be empty".to_string()));
    }

    let key = state.credentials.create_api_key(name).await?;
    Ok((StatusCode::CREATED, Json(key)))
}

pub async fn list_api_keys(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<Vec<ApiKey>>> {
    require_admin(&state, &headers)?;
    Ok(Json(state.credentials.list_api_keys().await?))
}

pub async fn delete_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Result<Json<DeleteResponse>> {
    require_admin(&state, &headers)?;
    state.credentials.deactivate_api_key(id).await?;

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("API key {} deactivated", id),
    }))
}
