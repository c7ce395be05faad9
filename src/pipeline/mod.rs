//! Background removal pipeline

pub mod remover;
pub mod strategy;

pub use remover::{BackgroundRemover, RemovalOptions, RemovalOutput};
pub use strategy::{ModelHint, Strategy, PASSTHROUGH};
