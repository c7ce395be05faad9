//! Deterministic in-process sessions for tests and offline runs

use async_trait::async_trait;
use image::{GrayImage, Luma, RgbImage};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::segmentation::models;
use crate::segmentation::session::{SegmentationSession, SessionFactory};

/// Predicts a centred ellipse covering the middle of the frame
pub struct MockSession {
    name: String,
    broken: bool,
}

impl MockSession {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            broken: false,
        }
    }
}

impl SegmentationSession for MockSession {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn predict_mask(&self, image: &RgbImage) -> Result<GrayImage> {
        if self.broken {
            return Err(AppError::Processing(format!("{} inference failed", self.name)));
        }

        let (w, h) = image.dimensions();
        let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
        let (rx, ry) = ((w as f32 / 3.0).max(1.0), (h as f32 / 3.0).max(1.0));

        Ok(GrayImage::from_fn(w, h, |x, y| {
            let dx = (x as f32 + 0.5 - cx) / rx;
            let dy = (y as f32 + 0.5 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                Luma([255])
            } else {
                Luma([0])
            }
        }))
    }
}

/// Factory for [`MockSession`]s with scriptable failures
#[derive(Default)]
pub struct MockSessionFactory {
    fail_to_build: HashSet<String>,
    fail_to_predict: HashSet<String>,
    builds: AtomicUsize,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Models that fail to initialize
    pub fn failing(names: &[&str]) -> Self {
        Self {
            fail_to_build: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Models that load but fail at inference time
    pub fn broken(mut self, names: &[&str]) -> Self {
        self.fail_to_predict.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Number of build attempts, successful or not
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn build_session(&self, model_name: &str) -> Result<Arc<dyn SegmentationSession>> {
        self.builds.fetch_add(1, Ordering::SeqCst);

        let spec = models::lookup(model_name)
            .ok_or_else(|| AppError::ModelUnavailable(format!("unknown model '{}'", model_name)))?;
        if self.fail_to_build.contains(spec.name) {
            return Err(AppError::ModelUnavailable(format!("{} could not be loaded", spec.name)));
        }

        Ok(Arc::new(MockSession {
            name: spec.name.to_string(),
            broken: self.fail_to_predict.contains(spec.name),
        }))
    }
}
