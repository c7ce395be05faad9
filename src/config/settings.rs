//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::segmentation::models;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub processing: ProcessingConfig,
    pub models: ModelsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound on a single request, including model download on first use
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    600
}

/// Allowed CORS origins. An empty list allows any origin.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// When set, API key management requires a matching `X-Admin-Token` header
    #[serde(default)]
    pub admin_token: Option<String>,
}

fn default_token_ttl_days() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rps")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

fn default_rps() -> u32 {
    5
}

fn default_burst() -> u32 {
    20
}

/// Image processing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    /// Longer edge bound applied before segmentation
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Accepted filename extensions, empty disables the check
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    #[serde(default)]
    pub enhance_quality: bool,
    #[serde(default = "default_true")]
    pub refine_edges: bool,
    /// Return the unmodified image when every model fails
    #[serde(default)]
    pub passthrough_fallback: bool,
}

fn default_max_dimension() -> u32 {
    1024
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["png".into(), "jpg".into(), "jpeg".into(), "webp".into()]
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_max_dimension(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
            enhance_quality: false,
            refine_edges: true,
            passthrough_fallback: false,
        }
    }
}

/// Segmentation and detection model configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    #[serde(default = "default_model_dir")]
    pub model_dir: String,
    #[serde(default = "default_download_base_url")]
    pub download_base_url: String,
    #[serde(default = "default_true")]
    pub allow_download: bool,
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
    /// Ordered preference list for the "auto" session
    #[serde(default = "default_auto_preference")]
    pub auto_preference: Vec<String>,
    #[serde(default = "default_baseline_model")]
    pub baseline_model: String,
    /// Build the default session at startup instead of on first request
    #[serde(default)]
    pub preload: bool,
    #[serde(default)]
    pub face_detector_path: Option<String>,
    #[serde(default)]
    pub pose_detector_path: Option<String>,
}

fn default_model_dir() -> String {
    "./models".to_string()
}

fn default_download_base_url() -> String {
    "https://github.com/danielgatis/rembg/releases/download/v0.0.0".to_string()
}

fn default_download_timeout() -> u64 {
    300
}

fn default_auto_preference() -> Vec<String> {
    vec![
        models::GENERAL_MODEL.to_string(),
        models::OBJECT_MODEL.to_string(),
        models::BASELINE_MODEL.to_string(),
    ]
}

fn default_baseline_model() -> String {
    models::BASELINE_MODEL.to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("auth.jwt_secret", "change-me")?
            .set_default("rate_limit.enabled", true)?
            .set_default("processing.max_dimension", default_max_dimension())?
            .set_default("models.model_dir", default_model_dir())?
            .set_default("logging.level", default_log_level())?
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with BG_REMOVER__)
            .add_source(
                Environment::with_prefix("BG_REMOVER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0".to_string()));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(invalid("server.request_timeout_secs must be positive".to_string()));
        }

        if self.auth.jwt_secret.trim().is_empty() {
            return Err(invalid("auth.jwt_secret cannot be empty".to_string()));
        }

        if self.auth.token_ttl_days <= 0 {
            return Err(invalid("auth.token_ttl_days must be positive".to_string()));
        }

        if self.processing.max_dimension < 64 {
            return Err(invalid(format!(
                "processing.max_dimension must be at least 64, got {}",
                self.processing.max_dimension
            )));
        }

        if self.models.auto_preference.is_empty() {
            return Err(invalid("models.auto_preference cannot be empty".to_string()));
        }

        for name in self
            .models
            .auto_preference
            .iter()
            .chain(std::iter::once(&self.models.baseline_model))
        {
            if models::lookup(name).is_none() {
                return Err(invalid(format!(
                    "Unknown model '{}'. Known models: {}",
                    name,
                    models::names().join(", ")
                )));
            }
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(invalid(format!(
                "logging.format must be 'json' or 'pretty', got '{}'",
                self.logging.format
            )));
        }

        Ok(())
    }
}

fn invalid(message: String) -> AppError {
    AppError::Config(config::ConfigError::Message(message))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
            },
            cors: CorsConfig::default(),
            auth: AuthConfig {
                jwt_secret: "change-me".to_string(),
                token_ttl_days: default_token_ttl_days(),
                admin_token: None,
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                requests_per_second: default_rps(),
                burst_size: default_burst(),
            },
            processing: ProcessingConfig::default(),
            models: ModelsConfig {
                model_dir: default_model_dir(),
                download_base_url: default_download_base_url(),
                allow_download: true,
                download_timeout_secs: default_download_timeout(),
                auto_preference: default_auto_preference(),
                baseline_model: default_baseline_model(),
                preload: false,
                face_detector_path: None,
                pose_detector_path: None,
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}
