//! HTTP route table and middleware stack

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

use crate::api::handlers::{api_keys, health, remove, users};
use crate::config::CorsConfig;
use crate::middleware::{AuthLayer, RateLimitLayer};
use crate::AppState;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::HeaderName::from_static("x-admin-token")])
        .expose_headers([
            header::CONTENT_DISPOSITION,
            header::HeaderName::from_static("x-processing-time"),
            header::HeaderName::from_static("x-model-used"),
            header::HeaderName::from_static("x-credential-name"),
            header::HeaderName::from_static("x-detected-type"),
        ]);

    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let settings = state.settings.clone();

    let public = Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/api-keys", post(api_keys::create_api_key).get(api_keys::list_api_keys))
        .route("/api-keys/:id", delete(api_keys::delete_api_key))
        .route("/auth/register", post(users::register))
        .route("/auth/login", post(users::login));

    let protected = Router::new()
        .route("/auth/me", get(users::me))
        .route("/remove-background", post(remove::remove_background))
        .route_layer(AuthLayer::new(state.authenticator.clone()));

    let mut app = public
        .merge(protected)
        .layer(DefaultBodyLimit::max(settings.processing.max_upload_bytes + MULTIPART_OVERHEAD));

    if settings.rate_limit.enabled {
        app = app.layer(RateLimitLayer::new(
            settings.rate_limit.requests_per_second,
            settings.rate_limit.burst_size,
            state.authenticator.clone(),
        ));
    }

    app.layer(TimeoutLayer::new(Duration::from_secs(settings.server.request_timeout_secs)))
        .layer(cors_layer(&settings.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
