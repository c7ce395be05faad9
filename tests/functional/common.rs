//! Shared fixtures: app construction, test images, multipart bodies

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Request, Response, StatusCode},
    Router,
};
use bg_removal_api::{
    api::create_router,
    config::Settings,
    detection::{ContentClassifier, FaceBox, FaceDetector, PoseDetector},
    imaging::codec,
    segmentation::mock::MockSessionFactory,
    AppState,
};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "bg-removal-test-boundary";

/// Always sees one face
pub struct OneFace;

impl FaceDetector for OneFace {
    fn detect_faces(&self, _image: &RgbImage) -> bg_removal_api::Result<Vec<FaceBox>> {
        Ok(vec![FaceBox {
            x1: 0.4,
            y1: 0.1,
            x2: 0.6,
            y2: 0.4,
            score: 0.95,
        }])
    }
}

/// Always sees a body pose
pub struct StandingPerson;

impl PoseDetector for StandingPerson {
    fn detect_pose(&self, _image: &RgbImage) -> bg_removal_api::Result<bool> {
        Ok(true)
    }
}

pub fn human_classifier() -> ContentClassifier {
    ContentClassifier::new(Some(Arc::new(OneFace)), Some(Arc::new(StandingPerson)))
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.rate_limit.enabled = false;
    settings.auth.jwt_secret = "functional-test-secret".to_string();
    settings
}

pub fn test_state(settings: Settings, classifier: ContentClassifier) -> Arc<AppState> {
    Arc::new(AppState::new(settings, Arc::new(MockSessionFactory::new()), classifier))
}

pub fn test_app() -> (Router, Arc<AppState>) {
    let state = test_state(test_settings(), ContentClassifier::disabled());
    (create_router(state.clone()), state)
}

pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn encode(image: RgbImage, format: ImageFormat) -> Vec<u8> {
    codec::encode_as(&DynamicImage::ImageRgb8(image), format).unwrap()
}

/// Minimal multipart/form-data writer
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
        self
    }

    pub fn file(mut self, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub fn removal_request(uri: &str, token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Create an API key through the HTTP API and return its secret
pub async fn create_api_key(app: &Router, name: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api-keys", json!({ "name": name })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["key"].as_str().unwrap().to_string()
}

pub async fn list_api_keys(app: &Router) -> Vec<Value> {
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api-keys").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await.as_array().unwrap().clone()
}
