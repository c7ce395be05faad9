//! Unit tests for response shaping

use axum::body::to_bytes;
use bg_removal_api::{
    detection::{ContentType, DetectionResult, ImageCharacteristics},
    pipeline::RemovalOutput,
    response::{base64, download_name, parse_bool, removal_response, RemovalEnvelope, ResponseFormat},
};
use std::time::Duration;
use uuid::Uuid;

fn output(detection: Option<DetectionResult>) -> RemovalOutput {
    RemovalOutput {
        request_id: Uuid::new_v4(),
        png: b"\x89PNG\r\n\x1a\nfake".to_vec(),
        model_used: "u2net".to_string(),
        processing_time: Duration::from_millis(1250),
        detection,
        input_size: (10, 10),
        output_size: (10, 10),
    }
}

fn object_detection() -> DetectionResult {
    DetectionResult {
        primary_type: ContentType::Object,
        confidence: 0.0,
        detected_faces: 0,
        has_pose: false,
        characteristics: ImageCharacteristics {
            width: 10,
            height: 10,
            aspect_ratio: 1.0,
            is_portrait: false,
            is_high_res: false,
        },
        recommended_model: "isnet-general-use",
    }
}

#[test]
fn test_response_format_flag() {
    assert_eq!(ResponseFormat::from_flag(None).unwrap(), ResponseFormat::Png);
    assert_eq!(ResponseFormat::from_flag(Some("true")).unwrap(), ResponseFormat::Json);
    assert_eq!(ResponseFormat::from_flag(Some("0")).unwrap(), ResponseFormat::Png);
    assert!(ResponseFormat::from_flag(Some("perhaps")).is_err());
}

#[test]
fn test_parse_bool_variants() {
    for value in ["true", "TRUE", "1", "yes", "on"] {
        assert!(parse_bool(value).unwrap(), "{value}");
    }
    for value in ["false", "0", "no", "off", ""] {
        assert!(!parse_bool(value).unwrap(), "{value}");
    }
}

#[test]
fn test_download_name_is_header_safe() {
    assert_eq!(download_name(Some("cat.photo.jpg")), "processed_cat_photo_jpg.png");
    assert_eq!(download_name(Some("we\"ird name.png")), "processed_we_ird_name_png.png");
    assert_eq!(download_name(None), "processed_image.png");
}

#[test]
fn test_envelope_inlines_png() {
    let envelope = RemovalEnvelope::from_output(&output(None));
    assert!(envelope.success);
    assert_eq!(envelope.model_used, "u2net");
    assert!((envelope.processing_time - 1.25).abs() < 1e-9);
    assert_eq!(base64::decode(&envelope.processed_image_url).unwrap(), output(None).png);
}

#[tokio::test]
async fn test_png_response_headers() {
    let response = removal_response(output(Some(object_detection())), ResponseFormat::Png, "ci key", Some("a.png"));
    let headers = response.headers();

    assert_eq!(headers["content-type"], "image/png");
    assert_eq!(headers["x-processing-time"], "1.250");
    assert_eq!(headers["x-model-used"], "u2net");
    assert_eq!(headers["x-credential-name"], "ci key");
    assert_eq!(headers["x-detected-type"], "object");
    assert_eq!(headers["content-disposition"], "attachment; filename=processed_a_png.png");

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], &output(None).png[..]);
}

#[tokio::test]
async fn test_json_response_omits_detection_header_without_classifier() {
    let response = removal_response(output(None), ResponseFormat::Json, "ci", None);
    assert!(response.headers().get("x-detected-type").is_none());
    assert!(response.headers().get("content-disposition").is_none());

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let envelope: RemovalEnvelope = serde_json::from_slice(&body).unwrap();
    assert!(envelope.processed_image_url.starts_with("data:image/png;base64,"));
}
