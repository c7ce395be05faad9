//! Credential store: the persistence seam plus an in-memory implementation

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::credentials::models::{generate_api_key, ApiKey, User};
use crate::error::{AppError, Result};

/// Persistence operations the service needs for credentials.
///
/// `touch_*` methods are the only mutating reads: they bump the usage counter and the
/// last-used timestamp of an active record and leave everything untouched otherwise.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_api_key(&self, name: &str) -> Result<ApiKey>;

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>>;

    async fn deactivate_api_key(&self, id: u64) -> Result<()>;

    /// Look up a key without recording a use
    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKey>>;

    /// Validate an API key and record one use of it
    async fn touch_api_key(&self, key: &str) -> Result<ApiKey>;

    async fn create_user(&self, email: &str, name: &str, password_hash: &str) -> Result<User>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_user(&self, id: u64) -> Result<Option<User>>;

    /// Validate a user account and record one use of it
    async fn touch_user(&self, id: u64) -> Result<User>;
}

#[derive(Default)]
struct Tables {
    api_keys: HashMap<u64, ApiKey>,
    key_index: HashMap<String, u64>,
    users: HashMap<u64, User>,
    email_index: HashMap<String, u64>,
    next_key_id: u64,
    next_user_id: u64,
}

/// Process-local credential store
#[derive(Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_api_key(&self, name: &str) -> Result<ApiKey> {
        let mut tables = self.tables.write();
        tables.next_key_id += 1;
        let api_key = ApiKey {
            id: tables.next_key_id,
            key: generate_api_key(),
            name: name.to_string(),
            created_at: Utc::now(),
            last_used: None,
            usage_count: 0,
            is_active: true,
        };

        tables.key_index.insert(api_key.key.clone(), api_key.id);
        tables.api_keys.insert(api_key.id, api_key.clone());
        info!(key_id = api_key.id, name = %api_key.name, "Created API key");
        Ok(api_key)
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>> {
        let tables = self.tables.read();
        let mut keys: Vec<ApiKey> = tables.api_keys.values().cloned().collect();
        keys.sort_by_key(|k| k.id);
        Ok(keys)
    }

    async fn deactivate_api_key(&self, id: u64) -> Result<()> {
        let mut tables = self.tables.write();
        let api_key = tables
            .api_keys
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("API key not found".to_string()))?;
        api_key.is_active = false;
        info!(key_id = id, "Deactivated API key");
        Ok(())
    }

    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKey>> {
        let tables = self.tables.read();
        Ok(tables
            .key_index
            .get(key)
            .and_then(|id| tables.api_keys.get(id))
            .cloned())
    }

    async fn touch_api_key(&self, key: &str) -> Result<ApiKey> {
        let mut tables = self.tables.write();
        let id = *tables
            .key_index
            .get(key)
            .ok_or_else(|| AppError::AuthenticationFailed("Invalid API key".to_string()))?;
        let api_key = tables
            .api_keys
            .get_mut(&id)
            .ok_or_else(|| AppError::AuthenticationFailed("Invalid API key".to_string()))?;

        if !api_key.is_active {
            return Err(AppError::AuthenticationFailed("API key is inactive".to_string()));
        }

        api_key.usage_count += 1;
        api_key.last_used = Some(Utc::now());
        debug!(key_id = id, usage_count = api_key.usage_count, "API key used");
        Ok(api_key.clone())
    }

    async fn create_user(&self, email: &str, name: &str, password_hash: &str) -> Result<User> {
        let email = normalize_email(email);
        let mut tables = self.tables.write();
        if tables.email_index.contains_key(&email) {
            return Err(AppError::Conflict(format!("Email '{}' is already registered", email)));
        }

        tables.next_user_id += 1;
        let user = User {
            id: tables.next_user_id,
            email: email.clone(),
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
            last_used: None,
            usage_count: 0,
            is_active: true,
        };

        tables.email_index.insert(email, user.id);
        tables.users.insert(user.id, user.clone());
        info!(user_id = user.id, "Registered user");
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read();
        Ok(tables
            .email_index
            .get(&normalize_email(email))
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn get_user(&self, id: u64) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn touch_user(&self, id: u64) -> Result<User> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::AuthenticationFailed("Unknown user".to_string()))?;

        if !user.is_active {
            return Err(AppError::AuthenticationFailed("User account is inactive".to_string()));
        }

        user.usage_count += 1;
        user.last_used = Some(Utc::now());
        Ok(user.clone())
    }
}
