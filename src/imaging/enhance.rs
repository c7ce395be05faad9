//! Pre-segmentation quality enhancement

use image::{Rgb, RgbImage};

pub const CONTRAST_FACTOR: f32 = 1.2;
pub const SHARPNESS_FACTOR: f32 = 1.1;
pub const BRIGHTNESS_FACTOR: f32 = 1.15;
/// Mean luminance under which the brightness boost applies
pub const DARK_THRESHOLD: f32 = 100.0;

/// ITU-R 601 luma of one pixel
fn luma(p: &Rgb<u8>) -> f32 {
    (299.0 * p[0] as f32 + 587.0 * p[1] as f32 + 114.0 * p[2] as f32) / 1000.0
}

/// Mean luminance over the whole bitmap, 0 for an empty one
pub fn mean_luminance(image: &RgbImage) -> f32 {
    let count = image.width() as f64 * image.height() as f64;
    if count == 0.0 {
        return 0.0;
    }
    let total: f64 = image.pixels().map(|p| luma(p) as f64).sum();
    (total / count) as f32
}

/// Contrast, sharpness and (for dark images) brightness boost
pub fn enhance(image: &RgbImage) -> RgbImage {
    let dark = mean_luminance(image) < DARK_THRESHOLD;

    let mut out = adjust_contrast(image, CONTRAST_FACTOR);
    out = adjust_sharpness(&out, SHARPNESS_FACTOR);
    if dark {
        out = adjust_brightness(&out, BRIGHTNESS_FACTOR);
    }
    out
}

fn blend(degenerate: f32, value: u8, factor: f32) -> u8 {
    (degenerate + factor * (value as f32 - degenerate)).round().clamp(0.0, 255.0) as u8
}

/// Scale each channel's distance from the mean gray level
pub fn adjust_contrast(image: &RgbImage, factor: f32) -> RgbImage {
    let mean = mean_luminance(image).round();
    let mut out = image.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            p[c] = blend(mean, p[c], factor);
        }
    }
    out
}

pub fn adjust_brightness(image: &RgbImage, factor: f32) -> RgbImage {
    let mut out = image.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            p[c] = blend(0.0, p[c], factor);
        }
    }
    out
}

/// Blend against a 3x3 smoothed copy; factor > 1 sharpens. Border pixels are kept as-is.
pub fn adjust_sharpness(image: &RgbImage, factor: f32) -> RgbImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if w < 3 || h < 3 {
        return out;
    }

    // Smoothing kernel: weight 5 in the centre, 1 for the 8 neighbours
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = [0f32; 3];
            for dy in 0..3 {
                for dx in 0..3 {
                    let weight = if dx == 1 && dy == 1 { 5.0 } else { 1.0 };
                    let p = image.get_pixel(x + dx - 1, y + dy - 1);
                    for c in 0..3 {
                        acc[c] += weight * p[c] as f32;
                    }
                }
            }

            let src = image.get_pixel(x, y);
            let dst = out.get_pixel_mut(x, y);
            for c in 0..3 {
                let smooth = (acc[c] / 13.0).round();
                dst[c] = blend(smooth, src[c], factor);
            }
        }
    }
    out
}
