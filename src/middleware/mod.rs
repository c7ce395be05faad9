//! Tower middleware for authentication and rate limiting

pub mod auth;
pub mod rate_limit;

pub use auth::AuthLayer;
pub use rate_limit::RateLimitLayer;
