//! Functional tests for credential authentication and account endpoints

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    routing::get,
    Router,
};
use bg_removal_api::{
    api::create_router,
    credentials::{Authenticator, CredentialStore, InMemoryCredentialStore, JwtService},
    detection::ContentClassifier,
    middleware::auth::AuthLayer,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::common::{body_json, create_api_key, json_request, list_api_keys, test_app, test_settings, test_state};

async fn create_guarded_app() -> (Router, String) {
    let store = Arc::new(InMemoryCredentialStore::new());
    let key = store.create_api_key("guarded").await.unwrap();
    let authenticator = Arc::new(Authenticator::new(store, JwtService::new("secret", 1)));

    let app = Router::new()
        .route("/test", get(|| async { "OK" }))
        .layer(AuthLayer::new(authenticator));
    (app, key.key)
}

fn get_with(uri: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_auth_with_valid_bearer_token() {
    let (app, key) = create_guarded_app().await;
    let response = app
        .oneshot(get_with("/test", Some(&format!("Bearer {}", key))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_with_valid_key_no_bearer() {
    let (app, key) = create_guarded_app().await;
    let response = app.oneshot(get_with("/test", Some(&key))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_with_invalid_key() {
    let (app, _) = create_guarded_app().await;
    let response = app
        .oneshot(get_with("/test", Some("Bearer bgr_not-a-real-key")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Authentication failed");
}

#[tokio::test]
async fn test_auth_without_header() {
    let (app, _) = create_guarded_app().await;
    let response = app.oneshot(get_with("/test", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let (app, _) = test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            json!({ "email": "Ada@Example.com", "password": "correct horse", "name": "Ada" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["email"], "ada@example.com");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "ada@example.com", "password": "correct horse" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let login = body_json(response).await;
    assert_eq!(login["token_type"], "bearer");
    assert_eq!(login["expires_in"], 30 * 24 * 3600);
    let token = login["access_token"].as_str().unwrap().to_string();

    let response = app
        .oneshot(get_with("/auth/me", Some(&format!("Bearer {}", token))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["name"], "Ada");
    assert_eq!(me["usage_count"], 1);
}

#[tokio::test]
async fn test_register_validation_and_conflict() {
    let (app, _) = test_app();
    let register = |body| app.clone().oneshot(json_request("POST", "/auth/register", body));

    let response = register(json!({ "email": "no-at-sign", "password": "longenough", "name": "X" }))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = register(json!({ "email": "x@example.com", "password": "short", "name": "X" }))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = register(json!({ "email": "x@example.com", "password": "longenough", "name": "X" }))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = register(json!({ "email": "X@example.com", "password": "longenough", "name": "X" }))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let (app, _) = test_app();
    app.clone()
        .oneshot(json_request(
            "POST",
            "/auth/register",
            json!({ "email": "grace@example.com", "password": "hopper1906", "name": "Grace" }),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "grace@example.com", "password": "hopper1907" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_requires_user_token() {
    let (app, _) = test_app();
    let key = create_api_key(&app, "script").await;

    let response = app
        .oneshot(get_with("/auth/me", Some(&format!("Bearer {}", key))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_key_management_respects_admin_token() {
    let mut settings = test_settings();
    settings.auth.admin_token = Some("let-me-in".to_string());
    let app = create_router(test_state(settings, ContentClassifier::disabled()));

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api-keys", json!({ "name": "ci" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = json_request("POST", "/api-keys", json!({ "name": "ci" }));
    request.headers_mut().insert("x-admin-token", "wrong".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let mut request = json_request("POST", "/api-keys", json!({ "name": "ci" }));
    request.headers_mut().insert("x-admin-token", "let-me-in".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(body_json(response).await["key"].as_str().unwrap().starts_with("bgr_"));
}

#[tokio::test]
async fn test_deactivated_key_is_rejected() {
    let (app, _) = test_app();
    let key = create_api_key(&app, "temporary").await;
    let id = list_api_keys(&app).await[0]["id"].as_u64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api-keys/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api-keys/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get_with("/auth/me", Some(&format!("Bearer {}", key))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
