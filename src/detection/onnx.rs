//! ONNX face and pose detectors

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use parking_lot::Mutex;
use std::path::Path;
use tracing::debug;

use crate::detection::detectors::{non_max_suppression, FaceBox, FaceDetector, PoseDetector};
use crate::error::{AppError, Result};
use crate::segmentation::onnx::load_session;

const FACE_INPUT_WIDTH: u32 = 320;
const FACE_INPUT_HEIGHT: u32 = 240;
const FACE_SCORE_THRESHOLD: f32 = 0.7;
const FACE_IOU_THRESHOLD: f32 = 0.3;

const POSE_INPUT_SIZE: u32 = 192;
const KEYPOINT_COUNT: usize = 17;
const KEYPOINT_SCORE_THRESHOLD: f32 = 0.3;
const MIN_VISIBLE_KEYPOINTS: usize = 5;

fn inference_error(what: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Processing(format!("{}: {}", what, e))
}

/// UltraFace RFB-320 detector
pub struct UltraFaceDetector {
    session: Mutex<Session>,
}

impl UltraFaceDetector {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            session: Mutex::new(load_session(path)?),
        })
    }

    pub fn preprocess(image: &RgbImage) -> Array4<f32> {
        let resized = image::imageops::resize(image, FACE_INPUT_WIDTH, FACE_INPUT_HEIGHT, FilterType::Triangle);
        Array4::from_shape_fn(
            (1, 3, FACE_INPUT_HEIGHT as usize, FACE_INPUT_WIDTH as usize),
            |(_, c, y, x)| (resized.get_pixel(x as u32, y as u32)[c] as f32 - 127.0) / 128.0,
        )
    }

    /// Turn flat `[N, 2]` scores and `[N, 4]` corner boxes into filtered detections
    pub fn decode(scores: &[f32], boxes: &[f32]) -> Vec<FaceBox> {
        let candidates = scores
            .chunks_exact(2)
            .zip(boxes.chunks_exact(4))
            .filter(|(s, _)| s[1] > FACE_SCORE_THRESHOLD)
            .map(|(s, b)| FaceBox {
                x1: b[0].clamp(0.0, 1.0),
                y1: b[1].clamp(0.0, 1.0),
                x2: b[2].clamp(0.0, 1.0),
                y2: b[3].clamp(0.0, 1.0),
                score: s[1],
            })
            .collect();
        non_max_suppression(candidates, FACE_IOU_THRESHOLD)
    }
}

impl FaceDetector for UltraFaceDetector {
    fn detect_faces(&self, image: &RgbImage) -> Result<Vec<FaceBox>> {
        let input = Self::preprocess(image);

        let mut session = self.session.lock();
        let tensor = TensorRef::from_array_view(&input).map_err(|e| inference_error("face input", e))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| inference_error("face detection", e))?;
        if outputs.len() < 2 {
            return Err(AppError::Processing("face detector returned too few outputs".to_string()));
        }

        let scores = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| inference_error("face scores", e))?;
        let boxes = outputs[1]
            .try_extract_array::<f32>()
            .map_err(|e| inference_error("face boxes", e))?;

        let scores: Vec<f32> = scores.iter().copied().collect();
        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let faces = Self::decode(&scores, &boxes);

        debug!(faces = faces.len(), "Face detection finished");
        Ok(faces)
    }
}

/// MoveNet single-pose detector
pub struct MoveNetPoseDetector {
    session: Mutex<Session>,
}

impl MoveNetPoseDetector {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self {
            session: Mutex::new(load_session(path)?),
        })
    }

    pub fn preprocess(image: &RgbImage) -> Array4<i32> {
        let resized = image::imageops::resize(image, POSE_INPUT_SIZE, POSE_INPUT_SIZE, FilterType::Triangle);
        Array4::from_shape_fn(
            (1, POSE_INPUT_SIZE as usize, POSE_INPUT_SIZE as usize, 3),
            |(_, y, x, c)| resized.get_pixel(x as u32, y as u32)[c] as i32,
        )
    }

    /// Keypoints come as `(y, x, score)` triples
    pub fn pose_present(keypoints: &[f32]) -> bool {
        keypoints
            .chunks_exact(3)
            .take(KEYPOINT_COUNT)
            .filter(|k| k[2] > KEYPOINT_SCORE_THRESHOLD)
            .count()
            >= MIN_VISIBLE_KEYPOINTS
    }
}

impl PoseDetector for MoveNetPoseDetector {
    fn detect_pose(&self, image: &RgbImage) -> Result<bool> {
        let input = Self::preprocess(image);

        let mut session = self.session.lock();
        let tensor = TensorRef::from_array_view(&input).map_err(|e| inference_error("pose input", e))?;
        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| inference_error("pose detection", e))?;
        if outputs.len() == 0 {
            return Err(AppError::Processing("pose detector returned no outputs".to_string()));
        }

        let keypoints = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| inference_error("pose keypoints", e))?;
        let keypoints: Vec<f32> = keypoints.iter().copied().collect();

        let present = Self::pose_present(&keypoints);
        debug!(present, "Pose detection finished");
        Ok(present)
    }
}
