//! Response shaping for processed images: raw PNG or a JSON envelope

pub mod base64;

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::pipeline::RemovalOutput;

pub const PROCESSING_TIME_HEADER: &str = "x-processing-time";
pub const MODEL_USED_HEADER: &str = "x-model-used";
pub const CREDENTIAL_NAME_HEADER: &str = "x-credential-name";
pub const DETECTED_TYPE_HEADER: &str = "x-detected-type";

/// How the processed image is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// `image/png` body with metadata headers
    #[default]
    Png,
    /// JSON envelope with the image inlined as a data URI
    Json,
}

impl ResponseFormat {
    /// Interpret a `return_json` flag
    pub fn from_flag(value: Option<&str>) -> Result<Self> {
        match value {
            None => Ok(Self::Png),
            Some(v) => Ok(if parse_bool(v)? { Self::Json } else { Self::Png }),
        }
    }
}

/// Lenient boolean parsing for form and query values
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        other => Err(AppError::InvalidRequest(format!("Expected a boolean, got '{}'", other))),
    }
}

/// JSON body returned when `return_json` is set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalEnvelope {
    pub success: bool,
    pub message: String,
    pub processed_image_url: String,
    /// Seconds
    pub processing_time: f64,
    pub model_used: String,
}

impl RemovalEnvelope {
    pub fn from_output(output: &RemovalOutput) -> Self {
        Self {
            success: true,
            message: "Background removed successfully".to_string(),
            processed_image_url: base64::create_data_url(&output.png, "image/png"),
            processing_time: output.processing_time.as_secs_f64(),
            model_used: output.model_used.clone(),
        }
    }
}

/// `processed_<stem>_<ext>.png`, restricted to header-safe characters
pub fn download_name(original: Option<&str>) -> String {
    let base: String = original
        .unwrap_or("image")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("processed_{}.png", base)
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// Build the HTTP response for a finished removal
pub fn removal_response(
    output: RemovalOutput,
    format: ResponseFormat,
    credential_name: &str,
    filename: Option<&str>,
) -> Response {
    let mut headers = HeaderMap::new();
    insert(
        &mut headers,
        PROCESSING_TIME_HEADER,
        &format!("{:.3}", output.processing_time.as_secs_f64()),
    );
    insert(&mut headers, MODEL_USED_HEADER, &output.model_used);
    insert(&mut headers, CREDENTIAL_NAME_HEADER, credential_name);
    if let Some(detection) = &output.detection {
        insert(&mut headers, DETECTED_TYPE_HEADER, detection.primary_type.as_str());
    }

    match format {
        ResponseFormat::Json => (headers, Json(RemovalEnvelope::from_output(&output))).into_response(),
        ResponseFormat::Png => {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
            insert(
                &mut headers,
                "content-disposition",
                &format!("attachment; filename={}", download_name(filename)),
            );
            (headers, output.png).into_response()
        }
    }
}
