//! Main entry point for the Background Removal API

use bg_removal_api::{
    api,
    config::{ModelsConfig, Settings},
    detection::{ContentClassifier, FaceDetector, MoveNetPoseDetector, PoseDetector, UltraFaceDetector},
    segmentation::{ModelStore, OnnxSessionFactory},
    AppState,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if settings.logging.format == "pretty" {
        registry.with(fmt::layer().pretty()).init();
    } else {
        registry.with(fmt::layer().json()).init();
    }
}

/// Load a detector if configured; a missing or broken model only disables that signal
async fn load_detector<T, F>(kind: &'static str, path: Option<&String>, load: F) -> Option<Arc<T>>
where
    T: Send + Sync + 'static,
    F: FnOnce(PathBuf) -> bg_removal_api::Result<T> + Send + 'static,
{
    let path = PathBuf::from(path?);
    if !path.is_file() {
        warn!(detector = kind, path = ?path, "Detector model not found, detection disabled");
        return None;
    }

    match tokio::task::spawn_blocking(move || load(path)).await {
        Ok(Ok(detector)) => {
            info!(detector = kind, "Detector loaded");
            Some(Arc::new(detector))
        }
        Ok(Err(e)) => {
            warn!(detector = kind, error = %e, "Failed to load detector, detection disabled");
            None
        }
        Err(e) => {
            warn!(detector = kind, error = %e, "Detector loading task failed");
            None
        }
    }
}

async fn build_classifier(config: &ModelsConfig) -> ContentClassifier {
    let face = load_detector("face", config.face_detector_path.as_ref(), |p| UltraFaceDetector::load(&p))
        .await
        .map(|d| d as Arc<dyn FaceDetector>);
    let pose = load_detector("pose", config.pose_detector_path.as_ref(), |p| MoveNetPoseDetector::load(&p))
        .await
        .map(|d| d as Arc<dyn PoseDetector>);
    ContentClassifier::new(face, pose)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    settings.validate()?;
    init_tracing(&settings);

    info!(
        host = %settings.server.host,
        port = settings.server.port,
        model_dir = %settings.models.model_dir,
        "Starting Background Removal API"
    );
    if settings.auth.jwt_secret == "change-me" {
        warn!("auth.jwt_secret is the built-in default; set BG_REMOVER__AUTH__JWT_SECRET in production");
    }

    let factory = Arc::new(OnnxSessionFactory::new(ModelStore::new(&settings.models)?));
    let classifier = build_classifier(&settings.models).await;
    let capabilities = classifier.capabilities();
    info!(
        face_detection = capabilities.face_detection,
        pose_detection = capabilities.pose_detection,
        "Content detection capabilities"
    );

    let state = Arc::new(AppState::new(settings, factory, classifier));

    if state.settings.models.preload {
        match state.sessions.get_default().await {
            Ok(session) => info!(model = %session.model_name(), "Preloaded default model"),
            Err(e) => warn!(error = %e, "Default model preload failed, will retry on demand"),
        }
    }

    let app = api::create_router(state.clone());

    let addr = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
