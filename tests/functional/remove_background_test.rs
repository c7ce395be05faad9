//! End-to-end tests for POST /remove-background

use axum::http::{header::CONTENT_TYPE, StatusCode};
use bg_removal_api::{api::create_router, detection::ContentClassifier, response::base64};
use image::{GenericImageView, ImageFormat};
use tower::ServiceExt;

use crate::common::{
    body_bytes, body_json, create_api_key, encode, gradient, human_classifier, list_api_keys, removal_request,
    test_app, test_settings, test_state, MultipartBody,
};

#[tokio::test]
async fn test_large_jpeg_with_human_hint_and_enhancement() {
    let app = create_router(test_state(test_settings(), ContentClassifier::disabled()));
    let key = create_api_key(&app, "e2e").await;

    let jpeg = encode(gradient(2000, 1000), ImageFormat::Jpeg);
    let body = MultipartBody::new()
        .file("person.jpg", "image/jpeg", &jpeg)
        .text("model_hint", "human")
        .text("enhance_quality", "true")
        .finish();

    let response = app
        .clone()
        .oneshot(removal_request("/remove-background", Some(&key), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(headers[CONTENT_TYPE], "image/png");
    assert_eq!(headers["x-model-used"], "u2net_human_seg");
    assert_eq!(headers["x-credential-name"], "e2e");
    // The hint bypasses classification
    assert!(headers.get("x-detected-type").is_none());

    let png = body_bytes(response).await;
    let output = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
    assert_eq!(output.dimensions(), (1024, 512));
    assert!(output.color().has_alpha());

    let keys = list_api_keys(&app).await;
    assert_eq!(keys[0]["usage_count"], 1);
}

#[tokio::test]
async fn test_large_jpeg_classified_as_human_with_enhancement() {
    let app = create_router(test_state(test_settings(), human_classifier()));
    let key = create_api_key(&app, "e2e").await;

    let jpeg = encode(gradient(2000, 1000), ImageFormat::Jpeg);
    let body = MultipartBody::new()
        .file("person.jpg", "image/jpeg", &jpeg)
        .text("enhance_quality", "true")
        .finish();

    let response = app
        .oneshot(removal_request("/remove-background", Some(&key), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(headers[CONTENT_TYPE], "image/png");
    assert_eq!(headers["x-model-used"], "u2net_human_seg");
    assert_eq!(headers["x-detected-type"], "human");
    assert_eq!(headers["x-credential-name"], "e2e");
    assert!(headers["x-processing-time"].to_str().unwrap().parse::<f64>().is_ok());
    assert_eq!(
        headers["content-disposition"],
        "attachment; filename=processed_person_jpg.png"
    );

    let png = body_bytes(response).await;
    let output = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
    let (width, height) = output.dimensions();
    assert!(width.max(height) <= 1024);
    assert_eq!((width, height), (1024, 512));
    assert!(output.color().has_alpha());
}

#[tokio::test]
async fn test_invalid_key_is_rejected_without_mutation() {
    let (app, _) = test_app();
    create_api_key(&app, "real").await;

    let body = MultipartBody::new()
        .file("a.png", "image/png", &encode(gradient(32, 32), ImageFormat::Png))
        .finish();
    let response = app
        .clone()
        .oneshot(removal_request("/remove-background", Some("bgr_forged"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let keys = list_api_keys(&app).await;
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["usage_count"], 0);
    assert!(keys[0]["last_used"].is_null());
}

#[tokio::test]
async fn test_missing_credential_is_unauthorized() {
    let (app, _) = test_app();
    let body = MultipartBody::new()
        .file("a.png", "image/png", &encode(gradient(8, 8), ImageFormat::Png))
        .finish();
    let response = app
        .oneshot(removal_request("/remove-background", None, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_corrupt_blob_is_invalid_image() {
    let (app, _) = test_app();
    let key = create_api_key(&app, "e2e").await;

    let body = MultipartBody::new()
        .file("photo.png", "image/png", &[0x89, b'P', b'N', b'G', 0, 1, 2, 3, 4, 5])
        .finish();
    let response = app
        .oneshot(removal_request("/remove-background", Some(&key), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid image file");
}

#[tokio::test]
async fn test_json_envelope() {
    let (app, _) = test_app();
    let key = create_api_key(&app, "e2e").await;

    let body = MultipartBody::new()
        .file("item.png", "image/png", &encode(gradient(80, 60), ImageFormat::Png))
        .text("model_hint", "object")
        .finish();
    let response = app
        .oneshot(removal_request("/remove-background?return_json=true", Some(&key), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-model-used"], "isnet-general-use");
    assert!(response.headers().get("x-detected-type").is_none());

    let envelope = body_json(response).await;
    assert_eq!(envelope["success"], true);
    assert_eq!(envelope["model_used"], "isnet-general-use");
    assert!(envelope["processing_time"].as_f64().unwrap() >= 0.0);

    let url = envelope["processed_image_url"].as_str().unwrap();
    assert_eq!(base64::mime_of_data_url(url), Some("image/png"));
    let png = base64::decode(url).unwrap();
    let image = image::load_from_memory(&png).unwrap();
    assert_eq!(image.dimensions(), (80, 60));
}

#[tokio::test]
async fn test_return_json_form_field() {
    let (app, _) = test_app();
    let key = create_api_key(&app, "e2e").await;

    let body = MultipartBody::new()
        .file("item.webp", "image/webp", &encode(gradient(40, 40), ImageFormat::WebP))
        .text("return_json", "1")
        .text("alpha_matting", "true")
        .text("alpha_matting_erode_size", "3")
        .finish();
    let response = app
        .oneshot(removal_request("/remove-background", Some(&key), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // Square image, no detectors: the object model
    assert_eq!(body_json(response).await["model_used"], "isnet-general-use");
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let (app, state) = test_app();
    let key = create_api_key(&app, "e2e").await;

    let too_big = vec![0u8; state.settings.processing.max_upload_bytes + 1];
    let body = MultipartBody::new().file("huge.png", "image/png", &too_big).finish();
    let response = app
        .oneshot(removal_request("/remove-background", Some(&key), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["details"]
        .as_str()
        .unwrap()
        .contains("File too large"));
}

#[tokio::test]
async fn test_request_validation() {
    let (app, _) = test_app();
    let key = create_api_key(&app, "e2e").await;
    let png = encode(gradient(16, 16), ImageFormat::Png);

    let cases = vec![
        MultipartBody::new().text("model_hint", "human").finish(),
        MultipartBody::new()
            .file("a.png", "image/png", &png)
            .text("model_hint", "segment-anything")
            .finish(),
        MultipartBody::new().file("a.gif", "image/gif", &png).finish(),
        MultipartBody::new()
            .file("a.png", "image/png", &png)
            .text("enhance_quality", "maybe")
            .finish(),
    ];

    for body in cases {
        let response = app
            .clone()
            .oneshot(removal_request("/remove-background", Some(&key), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_health_reports_loaded_models() {
    let (app, _) = test_app();
    let key = create_api_key(&app, "e2e").await;

    let body = MultipartBody::new()
        .file("a.png", "image/png", &encode(gradient(16, 16), ImageFormat::Png))
        .text("model_hint", "u2netp")
        .finish();
    app.clone()
        .oneshot(removal_request("/remove-background", Some(&key), body))
        .await
        .unwrap();

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/health")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = body_json(response).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["capabilities"]["face_detection"], false);
    assert_eq!(health["models"]["loaded"][0], "u2netp");
}

#[tokio::test]
async fn test_root_lists_models() {
    let app = create_router(test_state(test_settings(), ContentClassifier::disabled()));
    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let info = body_json(response).await;
    let models: Vec<&str> = info["models"].as_array().unwrap().iter().filter_map(|m| m.as_str()).collect();
    assert!(models.contains(&"birefnet-portrait"));
}
