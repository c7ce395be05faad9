//! Credential records and their API representations

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Prefix carried by every generated API key
pub const API_KEY_PREFIX: &str = "bgr_";

/// API key record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: u64,
    pub key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub is_active: bool,
}

/// User account record
#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub is_active: bool,
}

/// Public view of a user, without the password hash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_used: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub is_active: bool,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            created_at: user.created_at,
            last_used: user.last_used,
            usage_count: user.usage_count,
            is_active: user.is_active,
        }
    }
}

/// The caller behind an authenticated request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    ApiKey { id: u64, name: String, usage_count: u64 },
    User { id: u64, email: String, name: String, usage_count: u64 },
}

impl Principal {
    pub fn display_name(&self) -> &str {
        match self {
            Principal::ApiKey { name, .. } | Principal::User { name, .. } => name,
        }
    }

    pub fn usage_count(&self) -> u64 {
        match self {
            Principal::ApiKey { usage_count, .. } | Principal::User { usage_count, .. } => {
                *usage_count
            }
        }
    }
}

impl From<&ApiKey> for Principal {
    fn from(key: &ApiKey) -> Self {
        Principal::ApiKey {
            id: key.id,
            name: key.name.clone(),
            usage_count: key.usage_count,
        }
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Principal::User {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            usage_count: user.usage_count,
        }
    }
}

/// Generate a fresh API key: prefix plus 32 random bytes, URL-safe base64
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}{}", API_KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}
