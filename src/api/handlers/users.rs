//! User registration, login and profile

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::credentials::password::{hash_password_async, verify_password_async};
use crate::credentials::{Principal, UserResponse};
use crate::error::{AppError, Result};
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds
    pub expires_in: i64,
    pub user: UserResponse,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let email = request.email.trim();
    if !email.contains('@') {
        return Err(AppError::InvalidRequest("Invalid email address".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("Name cannot be empty".to_string()));
    }

    let password_hash = hash_password_async(request.password).await?;
    let user = state.credentials.create_user(email, name, &password_hash).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let rejected = || AppError::AuthenticationFailed("Incorrect email or password".to_string());

    let user = state
        .credentials
        .find_user_by_email(&request.email)
        .await?
        .ok_or_else(rejected)?;

    if !verify_password_async(request.password, user.password_hash.clone()).await {
        warn!(user_id = user.id, "Failed login attempt");
        return Err(rejected());
    }
    if !user.is_active {
        return Err(AppError::AuthenticationFailed("Account is inactive".to_string()));
    }

    let jwt = state.authenticator.jwt();
    let access_token = jwt.generate_token(&user)?;
    info!(user_id = user.id, "User logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: jwt.ttl_secs(),
        user: UserResponse::from(&user),
    }))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UserResponse>> {
    let Principal::User { id, .. } = principal else {
        return Err(AppError::Forbidden("This endpoint requires a user token".to_string()));
    };

    let user = state
        .credentials
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", id)))?;
    Ok(Json(UserResponse::from(&user)))
}
