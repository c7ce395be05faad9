//! Decode, validate, bound and encode uploaded images

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::Path;

use crate::error::{AppError, Result};

/// Whether the decoder accepts the bytes
pub fn validate_image(bytes: &[u8]) -> bool {
    image::load_from_memory(bytes).is_ok()
}

/// Decode uploaded bytes into an RGB bitmap
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(AppError::InvalidImage("Uploaded file is empty".to_string()));
    }

    let image = image::load_from_memory(bytes).map_err(|e| {
        AppError::InvalidImage(format!(
            "Please upload a valid image file (JPEG, PNG, etc.): {}",
            e
        ))
    })?;

    Ok(image.to_rgb8())
}

/// Reject filenames whose extension is not in `allowed`. Filenames without an
/// extension, and an empty allow-list, pass.
pub fn check_extension(filename: &str, allowed: &[String]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }

    let Some(extension) = Path::new(filename).extension().and_then(|e| e.to_str()) else {
        return Ok(());
    };

    if allowed.iter().any(|a| a.eq_ignore_ascii_case(extension)) {
        Ok(())
    } else {
        Err(AppError::InvalidRequest(format!(
            "Unsupported file type '.{}'. Allowed: {}",
            extension,
            allowed.join(", ")
        )))
    }
}

/// Target size with the longer edge clamped to `bound`
pub fn bounded_dimensions(width: u32, height: u32, bound: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= bound {
        return (width, height);
    }

    let scale = bound as f64 / longest as f64;
    let scaled = |v: u32| ((v as f64 * scale).round() as u32).clamp(1, bound);

    if width >= height {
        (bound, scaled(height))
    } else {
        (scaled(width), bound)
    }
}

/// Downscale so the longer edge equals `bound`; smaller images are returned unchanged
pub fn resize_to_bound(image: RgbImage, bound: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let (target_w, target_h) = bounded_dimensions(width, height, bound);
    if (target_w, target_h) == (width, height) {
        return image;
    }

    image::imageops::resize(&image, target_w, target_h, FilterType::Lanczos3)
}

/// Encode an RGBA bitmap as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| AppError::Processing(format!("Failed to encode PNG: {}", e)))?;
    Ok(buf)
}

/// Encode any bitmap in the given format, used for fixtures and previews
pub fn encode_as(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| AppError::Processing(format!("Failed to encode {:?}: {}", format, e)))?;
    Ok(buf)
}
