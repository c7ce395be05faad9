//! Image codec utilities and pre/post-processing filters

pub mod alpha;
pub mod codec;
pub mod enhance;

pub use alpha::MattingParams;
pub use codec::{check_extension, decode_image, encode_png, resize_to_bound, validate_image};
