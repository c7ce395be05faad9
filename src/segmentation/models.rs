//! Catalog of the pre-trained segmentation models the service can load

use serde::Serialize;

/// Full-body human segmentation
pub const HUMAN_MODEL: &str = "u2net_human_seg";
/// Near-frontal portrait segmentation
pub const PORTRAIT_MODEL: &str = "birefnet-portrait";
/// General-purpose salient object segmentation
pub const GENERAL_MODEL: &str = "u2net";
/// High-resolution object segmentation for landscape shots
pub const OBJECT_MODEL: &str = "isnet-general-use";
/// Smallest model, last resort
pub const BASELINE_MODEL: &str = "u2netp";

/// Per-channel input normalization: `(pixel / scale - mean) / std`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

const IMAGENET: Normalization = Normalization {
    mean: [0.485, 0.456, 0.406],
    std: [0.229, 0.224, 0.225],
};

const CENTERED: Normalization = Normalization {
    mean: [0.5, 0.5, 0.5],
    std: [1.0, 1.0, 1.0],
};

/// Divisor that brings 8-bit pixels into `[0, 1]` before normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelScale {
    /// Always 255
    Fixed,
    /// Brightest channel value of the resized input, so the image spans the full range
    ImageMax,
}

/// Transform applied to the raw network output before min-max scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Identity,
    Sigmoid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelSpec {
    pub name: &'static str,
    /// File name under the download base URL and the local model directory
    pub file_name: &'static str,
    /// Square input edge the network expects
    pub input_size: u32,
    pub normalization: Normalization,
    pub scale: PixelScale,
    pub activation: Activation,
}

const CATALOG: &[ModelSpec] = &[
    ModelSpec {
        name: "u2net",
        file_name: "u2net.onnx",
        input_size: 320,
        normalization: IMAGENET,
        scale: PixelScale::ImageMax,
        activation: Activation::Identity,
    },
    ModelSpec {
        name: "u2netp",
        file_name: "u2netp.onnx",
        input_size: 320,
        normalization: IMAGENET,
        scale: PixelScale::ImageMax,
        activation: Activation::Identity,
    },
    ModelSpec {
        name: "u2net_human_seg",
        file_name: "u2net_human_seg.onnx",
        input_size: 320,
        normalization: IMAGENET,
        scale: PixelScale::ImageMax,
        activation: Activation::Identity,
    },
    ModelSpec {
        name: "silueta",
        file_name: "silueta.onnx",
        input_size: 320,
        normalization: IMAGENET,
        scale: PixelScale::ImageMax,
        activation: Activation::Identity,
    },
    ModelSpec {
        name: "isnet-general-use",
        file_name: "isnet-general-use.onnx",
        input_size: 1024,
        normalization: CENTERED,
        scale: PixelScale::ImageMax,
        activation: Activation::Identity,
    },
    ModelSpec {
        name: "birefnet-portrait",
        file_name: "BiRefNet-portrait-epoch_150.onnx",
        input_size: 1024,
        normalization: IMAGENET,
        scale: PixelScale::Fixed,
        activation: Activation::Sigmoid,
    },
];

pub fn lookup(name: &str) -> Option<&'static ModelSpec> {
    let name = name.trim().to_ascii_lowercase();
    CATALOG.iter().find(|m| m.name == name)
}

pub fn names() -> Vec<&'static str> {
    CATALOG.iter().map(|m| m.name).collect()
}

pub fn all() -> &'static [ModelSpec] {
    CATALOG
}
