//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the two operations the pipeline needs
//! from a codec: decode (with probing) and encode. Everything else (resize
//! policy, flattening, the encode decision table) lives in
//! [`operations`](super::operations) and is backend-agnostic.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::format::FormatTag;
use super::params::{ColorMode, OutputFormat, Quality};
use crate::asset::SourceAsset;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Result of decoding and probing one asset.
///
/// Animated inputs are only probed: `pixels` stays `None` so frames are never
/// materialized for an image the pipeline is going to keep as-is.
#[derive(Debug)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub color_mode: ColorMode,
    pub animated: bool,
    /// Format the bytes actually turned out to be (may differ from the name).
    pub format: FormatTag,
    pub pixels: Option<DynamicImage>,
}

impl DecodedImage {
    /// A fully decoded single-frame image.
    pub fn still(image: DynamicImage, format: FormatTag, palette: bool) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            color_mode: ColorMode::from_color_type(image.color(), palette),
            animated: false,
            format,
            pixels: Some(image),
        }
    }

    /// A probed multi-frame image.
    pub fn animated(width: u32, height: u32, color_mode: ColorMode, format: FormatTag) -> Self {
        Self {
            width,
            height,
            color_mode,
            animated: true,
            format,
            pixels: None,
        }
    }
}

/// Trait for image codec backends.
///
/// Implementations must be `Sync`: one backend is shared by every worker.
pub trait ImageBackend: Sync {
    /// Rewind, probe and decode an asset. `hint` is the format implied by
    /// the filename.
    fn decode(&self, asset: &mut SourceAsset, hint: FormatTag) -> Result<DecodedImage, BackendError>;

    /// Encode pixels into `format`. `quality` is ignored by lossless formats.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
