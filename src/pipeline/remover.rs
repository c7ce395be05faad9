//! Request pipeline: decode, classify, segment, post-process, encode

use image::{RgbImage, Rgba, RgbaImage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ProcessingConfig;
use crate::detection::{ContentClassifier, DetectionResult};
use crate::error::{AppError, Result};
use crate::imaging::{alpha, codec, enhance, MattingParams};
use crate::pipeline::strategy::{ModelHint, Strategy, PASSTHROUGH};
use crate::segmentation::SessionCache;

/// Per-request processing switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalOptions {
    pub model_hint: ModelHint,
    pub enhance_quality: bool,
    pub refine_edges: bool,
    /// Trimap clamp parameters, `None` to skip matting
    pub alpha_matting: Option<MattingParams>,
}

impl RemovalOptions {
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            model_hint: ModelHint::Auto,
            enhance_quality: config.enhance_quality,
            refine_edges: config.refine_edges,
            alpha_matting: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemovalOutput {
    pub request_id: Uuid,
    /// PNG with the background made transparent
    pub png: Vec<u8>,
    pub model_used: String,
    pub processing_time: Duration,
    /// Classifier output, present only when no explicit hint was given
    pub detection: Option<DetectionResult>,
    pub input_size: (u32, u32),
    pub output_size: (u32, u32),
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Decoded,
    Classified,
    Segmented,
    PostProcessed,
    Encoded,
    Failed,
}

fn log_stage(request_id: Uuid, stage: Stage, started: Instant) {
    debug!(
        request_id = %request_id,
        stage = ?stage,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Pipeline stage reached"
    );
}

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError::Processing(format!("worker task failed: {}", e))
}

struct Prepared {
    image: RgbImage,
    input_size: (u32, u32),
    detection: Option<DetectionResult>,
}

/// Orchestrates a single background removal
pub struct BackgroundRemover {
    sessions: Arc<SessionCache>,
    classifier: Arc<ContentClassifier>,
    config: ProcessingConfig,
    baseline: String,
}

impl BackgroundRemover {
    pub fn new(
        sessions: Arc<SessionCache>,
        classifier: Arc<ContentClassifier>,
        config: ProcessingConfig,
        baseline: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            classifier,
            config,
            baseline: baseline.into(),
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub async fn remove_background(&self, bytes: Vec<u8>, options: RemovalOptions) -> Result<RemovalOutput> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        match self.run(request_id, bytes, options, started).await {
            Ok(output) => {
                info!(
                    request_id = %request_id,
                    model = %output.model_used,
                    input_width = output.input_size.0,
                    input_height = output.input_size.1,
                    output_bytes = output.png.len(),
                    elapsed_ms = output.processing_time.as_millis() as u64,
                    "Background removed"
                );
                Ok(output)
            }
            Err(e) => {
                log_stage(request_id, Stage::Failed, started);
                warn!(request_id = %request_id, error = %e, "Background removal failed");
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        request_id: Uuid,
        bytes: Vec<u8>,
        options: RemovalOptions,
        started: Instant,
    ) -> Result<RemovalOutput> {
        let max_dimension = self.config.max_dimension;
        let classifier = Arc::clone(&self.classifier);

        let prepared = tokio::task::spawn_blocking(move || -> Result<Prepared> {
            let image = codec::decode_image(&bytes)?;
            drop(bytes);
            let input_size = image.dimensions();

            let image = codec::resize_to_bound(image, max_dimension);
            let image = if options.enhance_quality {
                enhance::enhance(&image)
            } else {
                image
            };
            log_stage(request_id, Stage::Decoded, started);

            let detection = match options.model_hint {
                ModelHint::Auto => Some(classifier.classify(&image)),
                ModelHint::Model(_) => None,
            };
            log_stage(request_id, Stage::Classified, started);

            Ok(Prepared {
                image,
                input_size,
                detection,
            })
        })
        .await
        .map_err(join_error)??;

        let chosen = match (&options.model_hint, &prepared.detection) {
            (ModelHint::Model(name), _) => *name,
            (ModelHint::Auto, Some(detection)) => detection.recommended_model,
            (ModelHint::Auto, None) => crate::segmentation::models::GENERAL_MODEL,
        };
        debug!(request_id = %request_id, model = chosen, "Model selected");

        let image = Arc::new(prepared.image);
        let (cutout, model_used) = self.segment(request_id, Arc::clone(&image), chosen).await?;
        drop(image);
        log_stage(request_id, Stage::Segmented, started);

        let (png, output_size) = tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, (u32, u32))> {
            let mut cutout = cutout;
            if let Some(params) = options.alpha_matting {
                alpha::alpha_matting(&mut cutout, params);
            }
            if options.refine_edges {
                alpha::refine_alpha(&mut cutout);
            }
            log_stage(request_id, Stage::PostProcessed, started);

            let size = cutout.dimensions();
            let png = codec::encode_png(&cutout)?;
            Ok((png, size))
        })
        .await
        .map_err(join_error)??;
        log_stage(request_id, Stage::Encoded, started);

        Ok(RemovalOutput {
            request_id,
            png,
            model_used,
            processing_time: started.elapsed(),
            detection: prepared.detection,
            input_size: prepared.input_size,
            output_size,
        })
    }

    /// Walk the fallback chain until a strategy produces a cut-out.
    ///
    /// Fails with `ModelUnavailable` when every attempt failed to initialize, and with
    /// `Processing` otherwise.
    async fn segment(&self, request_id: Uuid, image: Arc<RgbImage>, chosen: &str) -> Result<(RgbaImage, String)> {
        let plan = Strategy::plan(chosen, &self.baseline, self.config.passthrough_fallback);
        let mut tried: Vec<String> = Vec::new();
        let mut only_init_failures = true;
        let mut last_error: Option<AppError> = None;

        for strategy in plan {
            let session = match &strategy {
                Strategy::Passthrough => {
                    warn!(request_id = %request_id, "All models failed, returning opaque passthrough");
                    return Ok((opaque(&image), PASSTHROUGH.to_string()));
                }
                Strategy::Model(name) => {
                    if tried.contains(name) {
                        continue;
                    }
                    self.sessions.get(name).await
                }
                Strategy::Default => self.sessions.get_default().await,
            };

            let session = match session {
                Ok(session) => session,
                Err(e) => {
                    warn!(request_id = %request_id, strategy = %strategy, error = %e, "Session unavailable");
                    if let Strategy::Model(name) = &strategy {
                        tried.push(name.clone());
                    }
                    only_init_failures &= e.is_initialization_failure();
                    last_error = Some(e);
                    continue;
                }
            };

            let name = session.model_name().to_string();
            if tried.contains(&name) {
                continue;
            }
            tried.push(name.clone());

            let input = Arc::clone(&image);
            let result = tokio::task::spawn_blocking(move || session.segment(&input))
                .await
                .unwrap_or_else(|e| Err(join_error(e)));

            match result {
                Ok(cutout) => return Ok((cutout, name)),
                Err(e) => {
                    warn!(request_id = %request_id, model = %name, error = %e, "Segmentation failed");
                    only_init_failures &= e.is_initialization_failure();
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no segmentation strategy available".to_string());
        if only_init_failures {
            Err(AppError::ModelUnavailable(detail))
        } else {
            Err(AppError::Processing(detail))
        }
    }
}

fn opaque(image: &RgbImage) -> RgbaImage {
    let (w, h) = image.dimensions();
    RgbaImage::from_fn(w, h, |x, y| {
        let p = image.get_pixel(x, y);
        Rgba([p[0], p[1], p[2], 255])
    })
}
