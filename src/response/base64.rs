//! Base64 and data URI helpers

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{AppError, Result};

pub fn encode(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode plain base64 or the payload of a `data:` URI
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let payload = match encoded.split_once(',') {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => encoded,
    };

    STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::InvalidRequest(format!("Invalid base64 data: {}", e)))
}

/// `data:<mime>;base64,<payload>`
pub fn create_data_url(data: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, encode(data))
}

/// Media type of a data URI, e.g. `image/png`
pub fn mime_of_data_url(data_url: &str) -> Option<&str> {
    let rest = data_url.strip_prefix("data:")?;
    let end = rest.find(';')?;
    Some(&rest[..end])
}
