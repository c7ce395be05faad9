//! ONNX Runtime backed segmentation sessions

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{GrayImage, Luma, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::segmentation::download::ModelStore;
use crate::segmentation::models::{self, Activation, ModelSpec, PixelScale};
use crate::segmentation::session::{SegmentationSession, SessionFactory};

/// Load an ONNX model from disk. Blocking.
pub fn load_session(path: &Path) -> Result<Session> {
    Session::builder()
        .map_err(|e| AppError::ModelUnavailable(format!("create ONNX session builder: {}", e)))?
        .commit_from_file(path)
        .map_err(|e| {
            AppError::ModelUnavailable(format!("load ONNX model {}: {}", path.display(), e))
        })
}

/// A loaded segmentation network.
///
/// ONNX Runtime needs exclusive access to run a session, so concurrent requests on
/// the same model take turns on the inner lock.
pub struct OnnxSegmentationSession {
    spec: &'static ModelSpec,
    session: Mutex<Session>,
}

impl OnnxSegmentationSession {
    pub fn load(spec: &'static ModelSpec, path: &Path) -> Result<Self> {
        let session = load_session(path)?;
        Ok(Self {
            spec,
            session: Mutex::new(session),
        })
    }
}

/// NCHW float tensor, resized to the model's square input and normalized
pub fn image_to_tensor(image: &RgbImage, spec: &ModelSpec) -> Array4<f32> {
    let size = spec.input_size;
    let resized = image::imageops::resize(image, size, size, FilterType::Lanczos3);
    let norm = spec.normalization;
    let divisor = match spec.scale {
        PixelScale::Fixed => 255.0,
        PixelScale::ImageMax => resized.as_raw().iter().copied().max().unwrap_or(0).max(1) as f32,
    };

    Array4::from_shape_fn((1, 3, size as usize, size as usize), |(_, c, y, x)| {
        let v = resized.get_pixel(x as u32, y as u32)[c] as f32 / divisor;
        (v - norm.mean[c]) / norm.std[c]
    })
}

/// Min-max normalize a raw prediction into an 8-bit mask
pub fn prediction_to_mask(values: &[f32], width: u32, height: u32, activation: Activation) -> GrayImage {
    let activated: Vec<f32> = match activation {
        Activation::Identity => values.to_vec(),
        Activation::Sigmoid => values.iter().map(|v| 1.0 / (1.0 + (-v).exp())).collect(),
    };

    let (min, max) = activated
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;

    let mut mask = GrayImage::new(width, height);
    for (i, p) in mask.pixels_mut().enumerate() {
        let v = activated.get(i).copied().unwrap_or(0.0);
        let scaled = if range > f32::EPSILON {
            (v - min) / range
        } else {
            v.clamp(0.0, 1.0)
        };
        *p = Luma([(scaled * 255.0).round().clamp(0.0, 255.0) as u8]);
    }
    mask
}

impl SegmentationSession for OnnxSegmentationSession {
    fn model_name(&self) -> &str {
        self.spec.name
    }

    fn predict_mask(&self, image: &RgbImage) -> Result<GrayImage> {
        let started = Instant::now();
        let input = image_to_tensor(image, self.spec);

        let (values, width, height) = {
            let mut session = self.session.lock();
            let tensor = TensorRef::from_array_view(&input)
                .map_err(|e| AppError::Processing(format!("build input tensor: {}", e)))?;
            let outputs = session
                .run(ort::inputs![tensor])
                .map_err(|e| AppError::Processing(format!("run {}: {}", self.spec.name, e)))?;

            if outputs.len() == 0 {
                return Err(AppError::Processing(format!("{} produced no outputs", self.spec.name)));
            }

            let out = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| AppError::Processing(format!("extract output tensor: {}", e)))?;
            let shape = out.shape().to_vec();
            if shape.len() != 4 || shape[0] != 1 || shape[1] != 1 {
                return Err(AppError::Processing(format!(
                    "unexpected output shape {:?} from {} (expected [1, 1, H, W])",
                    shape, self.spec.name
                )));
            }

            let values: Vec<f32> = out.iter().copied().collect();
            (values, shape[3] as u32, shape[2] as u32)
        };

        let small = prediction_to_mask(&values, width, height, self.spec.activation);
        let mask = image::imageops::resize(&small, image.width(), image.height(), FilterType::Lanczos3);

        debug!(
            model = %self.spec.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Predicted mask"
        );
        Ok(mask)
    }
}

/// Builds ONNX sessions, fetching model files through the model store
pub struct OnnxSessionFactory {
    store: ModelStore,
}

impl OnnxSessionFactory {
    pub fn new(store: ModelStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionFactory for OnnxSessionFactory {
    async fn build_session(&self, model_name: &str) -> Result<Arc<dyn SegmentationSession>> {
        let spec = models::lookup(model_name)
            .ok_or_else(|| AppError::ModelUnavailable(format!("unknown model '{}'", model_name)))?;

        let path = self.store.ensure(spec).await?;
        let started = Instant::now();

        let session = tokio::task::spawn_blocking(move || OnnxSegmentationSession::load(spec, &path))
            .await
            .map_err(|e| AppError::ModelUnavailable(format!("session construction aborted: {}", e)))??;

        info!(
            model = %spec.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Loaded segmentation model"
        );
        Ok(Arc::new(session))
    }
}
