//! Content classification driving automatic model choice

use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::detection::capabilities::Capabilities;
use crate::detection::detectors::{FaceDetector, PoseDetector};
use crate::error::Result;
use crate::segmentation::models::{GENERAL_MODEL, HUMAN_MODEL, OBJECT_MODEL, PORTRAIT_MODEL};

const FACE_WEIGHT: f32 = 0.4;
const POSE_WEIGHT: f32 = 0.3;
const HUMAN_THRESHOLD: f32 = 0.6;
const POSSIBLE_HUMAN_THRESHOLD: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Human,
    HumanPossible,
    Object,
    General,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Human => "human",
            ContentType::HumanPossible => "human_possible",
            ContentType::Object => "object",
            ContentType::General => "general",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageCharacteristics {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f32,
    pub is_portrait: bool,
    pub is_high_res: bool,
}

impl ImageCharacteristics {
    pub fn of(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            aspect_ratio: if height == 0 { 0.0 } else { width as f32 / height as f32 },
            is_portrait: height > width,
            is_high_res: width > 1000 || height > 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub primary_type: ContentType,
    pub confidence: f32,
    pub detected_faces: usize,
    pub has_pose: bool,
    pub characteristics: ImageCharacteristics,
    pub recommended_model: &'static str,
}

impl DetectionResult {
    fn general(characteristics: ImageCharacteristics) -> Self {
        Self {
            primary_type: ContentType::General,
            confidence: 0.0,
            detected_faces: 0,
            has_pose: false,
            characteristics,
            recommended_model: GENERAL_MODEL,
        }
    }

    /// No detector ran, so only the shape of the image informs the choice
    fn undetected(characteristics: ImageCharacteristics) -> Self {
        let recommended_model = if characteristics.is_portrait { GENERAL_MODEL } else { OBJECT_MODEL };
        Self {
            recommended_model,
            ..Self::general(characteristics)
        }
    }
}

/// Decides whether an image shows a person and which model suits it
pub struct ContentClassifier {
    face: Option<Arc<dyn FaceDetector>>,
    pose: Option<Arc<dyn PoseDetector>>,
}

impl ContentClassifier {
    pub fn new(face: Option<Arc<dyn FaceDetector>>, pose: Option<Arc<dyn PoseDetector>>) -> Self {
        Self { face, pose }
    }

    /// Classifier without detectors; everything is `general`, picked by orientation
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            face_detection: self.face.is_some(),
            pose_detection: self.pose.is_some(),
        }
    }

    /// Classify the image. Detector failures degrade to a `general` result.
    pub fn classify(&self, image: &RgbImage) -> DetectionResult {
        let characteristics = ImageCharacteristics::of(image);
        match self.try_classify(image, characteristics.clone()) {
            Ok(result) => {
                debug!(
                    primary_type = result.primary_type.as_str(),
                    confidence = result.confidence,
                    model = result.recommended_model,
                    "Content classified"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, "Content detection failed, using general model");
                DetectionResult::general(characteristics)
            }
        }
    }

    fn try_classify(&self, image: &RgbImage, characteristics: ImageCharacteristics) -> Result<DetectionResult> {
        if self.face.is_none() && self.pose.is_none() {
            return Ok(DetectionResult::undetected(characteristics));
        }

        let mut confidence = 0.0f32;

        let detected_faces = match &self.face {
            Some(detector) => detector.detect_faces(image)?.len(),
            None => 0,
        };
        if detected_faces > 0 {
            confidence += FACE_WEIGHT;
        }

        let has_pose = match &self.pose {
            Some(detector) => detector.detect_pose(image)?,
            None => false,
        };
        if has_pose {
            confidence += POSE_WEIGHT;
        }

        let (primary_type, recommended_model) = if confidence >= HUMAN_THRESHOLD {
            if characteristics.is_portrait && detected_faces > 0 {
                (ContentType::Human, PORTRAIT_MODEL)
            } else {
                (ContentType::Human, HUMAN_MODEL)
            }
        } else if confidence >= POSSIBLE_HUMAN_THRESHOLD {
            (ContentType::HumanPossible, HUMAN_MODEL)
        } else if characteristics.is_portrait {
            (ContentType::Object, GENERAL_MODEL)
        } else {
            (ContentType::Object, OBJECT_MODEL)
        };

        Ok(DetectionResult {
            primary_type,
            confidence,
            detected_faces,
            has_pose,
            characteristics,
            recommended_model,
        })
    }
}
