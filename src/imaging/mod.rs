//! Image processing: classify, decode, transform, encode.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Classify** | filename extension, magic bytes as a second opinion |
//! | **Decode/probe** | `image` decoders under `Limits`; `libheif-rs` for HEIC |
//! | **Resize** | `resize_exact` with Lanczos3, never enlarging |
//! | **Encode** | JPEG/PNG/GIF via `image`, lossy WebP via `webp` |
//!
//! The module is split into:
//! - **Format**: [`classify`] and [`sniff`]
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod format;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, DecodedImage, ImageBackend};
pub use calculations::{exceeds, fit_within};
pub use format::{Classification, FormatTag, classify, sniff, supported_extensions};
pub use operations::{
    EncodePlan, OptimizeSettings, Optimized, ThumbnailConfig, TransformedImage, create_thumbnail,
    optimize_image, plan_encoding, transform,
};
pub use params::{ColorMode, Envelope, OutputFormat, Quality};
pub use rust_backend::RustBackend;
