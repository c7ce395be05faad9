//! Face and pose detection used to classify image content

pub mod capabilities;
pub mod classifier;
pub mod detectors;
pub mod onnx;

pub use capabilities::Capabilities;
pub use classifier::{ContentClassifier, ContentType, DetectionResult, ImageCharacteristics};
pub use detectors::{FaceBox, FaceDetector, PoseDetector};
pub use onnx::{MoveNetPoseDetector, UltraFaceDetector};
