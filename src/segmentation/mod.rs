//! Salient object segmentation: model catalog, sessions and their cache

pub mod cache;
pub mod download;
pub mod mock;
pub mod models;
pub mod onnx;
pub mod session;

pub use cache::{CacheStatus, SessionCache};
pub use download::ModelStore;
pub use models::ModelSpec;
pub use onnx::OnnxSessionFactory;
pub use session::{SegmentationSession, SessionFactory};
