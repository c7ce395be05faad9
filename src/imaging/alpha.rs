//! Alpha channel composition and cleanup

use image::{GrayImage, Luma, RgbImage, Rgba, RgbaImage};

/// Alpha matting thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MattingParams {
    pub foreground_threshold: u8,
    pub background_threshold: u8,
    pub erode_size: u32,
}

impl Default for MattingParams {
    fn default() -> Self {
        Self {
            foreground_threshold: 240,
            background_threshold: 10,
            erode_size: 10,
        }
    }
}

/// Use `mask` as the alpha channel of `image`. The mask must match the image size.
pub fn apply_mask(image: &RgbImage, mask: &GrayImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        let p = image.get_pixel(x, y);
        Rgba([p[0], p[1], p[2], mask.get_pixel(x, y)[0]])
    })
}

pub fn extract_alpha(image: &RgbaImage) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| Luma([image.get_pixel(x, y)[3]]))
}

pub fn replace_alpha(image: &mut RgbaImage, alpha: &GrayImage) {
    for (x, y, p) in image.enumerate_pixels_mut() {
        p[3] = alpha.get_pixel(x, y)[0];
    }
}

/// 3x3 median filter with edge replication
pub fn median_filter_3x3(src: &GrayImage) -> GrayImage {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return src.clone();
    }

    GrayImage::from_fn(w, h, |x, y| {
        let mut window = [0u8; 9];
        let mut i = 0;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let sx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
                let sy = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
                window[i] = src.get_pixel(sx, sy)[0];
                i += 1;
            }
        }
        window.sort_unstable();
        Luma([window[4]])
    })
}

/// Linearly map the min..max range of the channel onto 0..255
pub fn stretch_contrast(src: &GrayImage) -> GrayImage {
    let (min, max) = src
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if max <= min {
        return src.clone();
    }

    let range = (max - min) as f32;
    let mut out = src.clone();
    for p in out.pixels_mut() {
        p[0] = (((p[0] - min) as f32) * 255.0 / range).round() as u8;
    }
    out
}

/// Denoise the alpha channel and widen it to the full range for crisper edges
pub fn refine_alpha(image: &mut RgbaImage) {
    let alpha = stretch_contrast(&median_filter_3x3(&extract_alpha(image)));
    replace_alpha(image, &alpha);
}

/// Erode a binary region with a square structuring element of `size`
fn erode(region: &[bool], w: usize, h: usize, size: usize) -> Vec<bool> {
    if size <= 1 {
        return region.to_vec();
    }
    let radius = size / 2;

    // Separable min-filter: rows, then columns
    let mut rows = vec![false; region.len()];
    for y in 0..h {
        for x in 0..w {
            let lo = x.saturating_sub(radius);
            let hi = (x + radius).min(w - 1);
            rows[y * w + x] = (lo..=hi).all(|sx| region[y * w + sx]);
        }
    }

    let mut out = vec![false; region.len()];
    for y in 0..h {
        for x in 0..w {
            let lo = y.saturating_sub(radius);
            let hi = (y + radius).min(h - 1);
            out[y * w + x] = (lo..=hi).all(|sy| rows[sy * w + x]);
        }
    }
    out
}

/// Trimap clamp: eroded sure-foreground becomes opaque, eroded sure-background becomes
/// transparent, and the uncertain band keeps its soft alpha.
pub fn alpha_matting(image: &mut RgbaImage, params: MattingParams) {
    let (w, h) = (image.width() as usize, image.height() as usize);
    if w == 0 || h == 0 {
        return;
    }

    let alpha: Vec<u8> = image.pixels().map(|p| p[3]).collect();
    let size = params.erode_size as usize;

    let foreground: Vec<bool> = alpha.iter().map(|&a| a > params.foreground_threshold).collect();
    let background: Vec<bool> = alpha.iter().map(|&a| a < params.background_threshold).collect();
    let foreground = erode(&foreground, w, h, size);
    let background = erode(&background, w, h, size);

    for (i, p) in image.pixels_mut().enumerate() {
        if foreground[i] {
            p[3] = 255;
        } else if background[i] {
            p[3] = 0;
        }
    }
}
