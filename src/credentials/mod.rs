//! Credential module - API keys, user accounts, tokens, and request authentication

pub mod authenticator;
pub mod jwt;
pub mod models;
pub mod password;
pub mod store;

pub use authenticator::Authenticator;
pub use jwt::JwtService;
pub use models::{ApiKey, Principal, User, UserResponse};
pub use store::{CredentialStore, InMemoryCredentialStore};
