//! Background Removal API
//!
//! An HTTP service that removes image backgrounds with ONNX segmentation models,
//! choosing a model per image from face and pose detection, behind API key and
//! user token authentication.

pub mod api;
pub mod config;
pub mod credentials;
pub mod detection;
pub mod error;
pub mod imaging;
pub mod middleware;
pub mod pipeline;
pub mod response;
pub mod segmentation;

pub use error::{AppError, Result};

use std::sync::Arc;
use std::time::Instant;

use credentials::{Authenticator, CredentialStore, InMemoryCredentialStore, JwtService};
use detection::{Capabilities, ContentClassifier};
use pipeline::BackgroundRemover;
use segmentation::{SessionCache, SessionFactory};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub credentials: Arc<dyn CredentialStore>,
    pub authenticator: Arc<Authenticator>,
    pub sessions: Arc<SessionCache>,
    pub remover: Arc<BackgroundRemover>,
    pub capabilities: Capabilities,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the service together around a session factory and content classifier
    pub fn new(settings: config::Settings, factory: Arc<dyn SessionFactory>, classifier: ContentClassifier) -> Self {
        let settings = Arc::new(settings);

        let credentials: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let jwt = JwtService::new(&settings.auth.jwt_secret, settings.auth.token_ttl_days);
        let authenticator = Arc::new(Authenticator::new(credentials.clone(), jwt));

        let sessions = Arc::new(SessionCache::new(factory, settings.models.auto_preference.clone()));
        let capabilities = classifier.capabilities();
        let remover = Arc::new(BackgroundRemover::new(
            sessions.clone(),
            Arc::new(classifier),
            settings.processing.clone(),
            settings.models.baseline_model.clone(),
        ));

        Self {
            settings,
            credentials,
            authenticator,
            sessions,
            remover,
            capabilities,
            started_at: Instant::now(),
        }
    }
}
