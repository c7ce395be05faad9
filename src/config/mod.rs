//! Configuration module

pub mod settings;

pub use settings::{
    AuthConfig, CorsConfig, LoggingConfig, ModelsConfig, ProcessingConfig, RateLimitConfig,
    ServerConfig, Settings,
};
