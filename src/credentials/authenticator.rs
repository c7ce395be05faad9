//! Resolves bearer tokens to principals

use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::sync::Arc;
use tracing::debug;

use crate::credentials::jwt::JwtService;
use crate::credentials::models::Principal;
use crate::credentials::store::CredentialStore;
use crate::error::{AppError, Result};

pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    jwt: JwtService,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, jwt: JwtService) -> Self {
        Self { store, jwt }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Extract the token from an `Authorization` header, with or without the `Bearer` scheme
    pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
        let token = match value.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            // A scheme with nothing after it carries no token
            None if value.eq_ignore_ascii_case("bearer") => "",
            _ => value,
        };
        (!token.is_empty()).then_some(token)
    }

    /// Validate a token and record one use of the matching credential
    pub async fn authenticate(&self, token: &str) -> Result<Principal> {
        if JwtService::looks_like_jwt(token) {
            let claims = self.jwt.verify_token(token)?;
            let id: u64 = claims
                .sub
                .parse()
                .map_err(|_| AppError::AuthenticationFailed("Invalid token subject".to_string()))?;
            let user = self.store.touch_user(id).await?;
            debug!(user_id = user.id, "Authenticated user token");
            return Ok(Principal::from(&user));
        }

        let api_key = self.store.touch_api_key(token).await?;
        debug!(key_id = api_key.id, "Authenticated API key");
        Ok(Principal::from(&api_key))
    }

    /// Stable identity of a valid credential, without recording a use.
    ///
    /// Unknown, inactive or badly signed tokens have no identity.
    pub async fn identify(&self, token: &str) -> Option<String> {
        if JwtService::looks_like_jwt(token) {
            return self.jwt.verify_token(token).ok().map(|claims| format!("user:{}", claims.sub));
        }
        match self.store.find_api_key(token).await {
            Ok(Some(api_key)) if api_key.is_active => Some(format!("key:{}", api_key.id)),
            _ => None,
        }
    }

    pub async fn authenticate_headers(&self, headers: &HeaderMap) -> Result<Principal> {
        let token = Self::bearer_token(headers).ok_or_else(|| {
            AppError::AuthenticationFailed(
                "Credential required. Provide via Authorization header: 'Bearer YOUR_API_KEY'"
                    .to_string(),
            )
        })?;
        self.authenticate(token).await
    }
}
