//! Common traits for segmentation sessions and their factories

use async_trait::async_trait;
use image::{GrayImage, RgbImage, RgbaImage};
use std::sync::Arc;

use crate::error::Result;
use crate::imaging::alpha::apply_mask;

/// A loaded segmentation model.
///
/// Implementations are shared across concurrent requests, so every method takes `&self`.
pub trait SegmentationSession: Send + Sync {
    /// Catalog name of the underlying model
    fn model_name(&self) -> &str;

    /// Foreground probability mask at the input's resolution
    fn predict_mask(&self, image: &RgbImage) -> Result<GrayImage>;

    /// Cut out the foreground: the predicted mask becomes the alpha channel
    fn segment(&self, image: &RgbImage) -> Result<RgbaImage> {
        let mask = self.predict_mask(image)?;
        Ok(apply_mask(image, &mask))
    }
}

/// Builds sessions by model name
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn build_session(&self, model_name: &str) -> Result<Arc<dyn SegmentationSession>>;
}
