//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take
//! settings, decide what to produce, and call the backend for pixel work.
//! Nothing in here catches errors: the [`pipeline`](crate::pipeline) guard
//! owns that.

use super::backend::{BackendError, DecodedImage, ImageBackend};
use super::calculations::{exceeds, fit_within};
use super::format::{FormatTag, extension_of};
use super::params::{ColorMode, Envelope, OutputFormat, Quality};
use crate::asset::{SourceAsset, stem_of, with_extension};
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Settings for the main optimize path.
#[derive(Debug, Clone, Copy)]
pub struct OptimizeSettings {
    pub bound: Envelope,
    pub prefer_modern: bool,
    pub quality: Quality,
}

/// Settings for thumbnail generation.
#[derive(Debug, Clone, Copy)]
pub struct ThumbnailConfig {
    pub bound: Envelope,
    pub quality: Quality,
}

/// What to do with a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodePlan {
    /// Keep the original bytes and name.
    PreserveOriginal,
    /// Animated content outside the supported animation path (APNG,
    /// animated WebP). Kept byte-for-byte and reported without dimensions.
    Unsupported,
    Encode(OutputFormat),
}

/// Pick the output encoding for a decoded image.
///
/// `declared` is the format named by the upload's extension and selects the
/// encode branch; `content` is what the bytes decoded as and only matters for
/// animations. Animated GIFs are kept as-is, other animations are treated as
/// unsupported. With the modern-container preference every still becomes
/// WebP; otherwise it re-encodes into its declared format, except HEIF which
/// has no encoder and becomes JPEG.
pub fn plan_encoding(
    declared: FormatTag,
    content: FormatTag,
    animated: bool,
    prefer_modern: bool,
) -> EncodePlan {
    if animated {
        return match content {
            FormatTag::Gif => EncodePlan::PreserveOriginal,
            _ => EncodePlan::Unsupported,
        };
    }
    if prefer_modern {
        return EncodePlan::Encode(OutputFormat::WebP);
    }
    EncodePlan::Encode(match declared {
        FormatTag::Jpeg => OutputFormat::Jpeg,
        FormatTag::Png => OutputFormat::Png,
        FormatTag::Gif => OutputFormat::Gif,
        FormatTag::WebP => OutputFormat::WebP,
        FormatTag::Heif => OutputFormat::Jpeg,
    })
}

/// Name for an artifact encoded as `format`.
///
/// Keeps `name` when its extension already denotes `format` (so `.jpeg`
/// stays `.jpeg`), otherwise rewrites the extension.
pub fn output_name(name: &str, format: OutputFormat) -> String {
    let matches = extension_of(name)
        .and_then(|ext| FormatTag::from_extension(&ext))
        .is_some_and(|tag| match tag {
            FormatTag::Jpeg => format == OutputFormat::Jpeg,
            FormatTag::Png => format == OutputFormat::Png,
            FormatTag::Gif => format == OutputFormat::Gif,
            FormatTag::WebP => format == OutputFormat::WebP,
            FormatTag::Heif => false,
        });
    if matches {
        name.to_string()
    } else {
        with_extension(name, format.extension())
    }
}

/// `{stem}_thumb.jpg`, whatever the source extension.
pub fn thumbnail_name(name: &str) -> String {
    format!("{}_thumb.jpg", stem_of(name))
}

/// Output of [`transform`].
#[derive(Debug)]
pub enum TransformedImage {
    /// Animated (or probe-only) input, passed through untouched.
    Untouched { width: u32, height: u32 },
    Still {
        image: DynamicImage,
        was_resized: bool,
        color_mode: ColorMode,
    },
}

impl TransformedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            TransformedImage::Untouched { width, height } => (*width, *height),
            TransformedImage::Still { image, .. } => (image.width(), image.height()),
        }
    }
}

/// Resize into `bound` and normalize colors for `target`.
///
/// Images larger than the bound on either edge are scaled down with
/// Lanczos3; smaller ones are left alone. Alpha and palette images are
/// flattened onto white when `target` cannot carry transparency.
pub fn transform(decoded: DecodedImage, bound: Envelope, target: OutputFormat) -> TransformedImage {
    let DecodedImage {
        width,
        height,
        color_mode,
        animated,
        pixels,
        ..
    } = decoded;
    let image = match pixels {
        Some(image) if !animated => image,
        _ => return TransformedImage::Untouched { width, height },
    };

    let (image, was_resized) = if exceeds((width, height), bound) {
        let (w, h) = fit_within((width, height), bound);
        (image.resize_exact(w, h, FilterType::Lanczos3), true)
    } else {
        (image, false)
    };

    let image = if !target.supports_alpha() && color_mode.needs_flattening() {
        flatten_onto_white(&image)
    } else {
        image
    };

    TransformedImage::Still {
        image,
        was_resized,
        color_mode,
    }
}

/// Composite onto an opaque white background.
///
/// Palette images are expanded to RGBA first, so transparent palette
/// entries flatten the same way as alpha pixels.
pub fn flatten_onto_white(image: &DynamicImage) -> DynamicImage {
    let rgba = image.to_rgba8();
    let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([over_white(r, a), over_white(g, a), over_white(b, a)])
    });
    DynamicImage::ImageRgb8(flat)
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let (c, a) = (channel as u32, alpha as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Result of [`optimize_image`].
#[derive(Debug)]
pub enum Optimized {
    /// Keep the input as-is; it decoded to these dimensions.
    Preserve { width: u32, height: u32 },
    /// Keep the input as-is and report no dimensions.
    Unsupported,
    Encoded {
        name: String,
        bytes: Vec<u8>,
        format: OutputFormat,
        width: u32,
        height: u32,
        was_resized: bool,
    },
}

/// Decode, transform and re-encode one asset.
///
/// A WebP that already fits and would come out as WebP under the same name
/// is preserved: encoding it again would only lose quality.
pub fn optimize_image(
    backend: &impl ImageBackend,
    asset: &mut SourceAsset,
    tag: FormatTag,
    settings: &OptimizeSettings,
) -> Result<Optimized> {
    let decoded = backend.decode(asset, tag)?;
    let (width, height) = (decoded.width, decoded.height);
    let plan = plan_encoding(
        tag,
        decoded.format,
        decoded.animated,
        settings.prefer_modern,
    );
    tracing::debug!(name = asset.name(), width, height, mode = ?decoded.color_mode, ?plan, "decoded");

    let format = match plan {
        EncodePlan::PreserveOriginal => return Ok(Optimized::Preserve { width, height }),
        EncodePlan::Unsupported => return Ok(Optimized::Unsupported),
        EncodePlan::Encode(format) => format,
    };
    let name = output_name(asset.name(), format);

    let already_optimized = decoded.format == FormatTag::WebP
        && format == OutputFormat::WebP
        && name == asset.name()
        && !exceeds((width, height), settings.bound);
    if already_optimized {
        return Ok(Optimized::Preserve { width, height });
    }

    match transform(decoded, settings.bound, format) {
        TransformedImage::Untouched { width, height } => Ok(Optimized::Preserve { width, height }),
        TransformedImage::Still {
            image, was_resized, ..
        } => {
            let bytes = backend.encode(&image, format, settings.quality)?;
            Ok(Optimized::Encoded {
                name,
                bytes,
                format,
                width: image.width(),
                height: image.height(),
                was_resized,
            })
        }
    }
}

/// Create a JPEG thumbnail fitting inside the configured box.
///
/// Returns `Ok(None)` for animated inputs.
pub fn create_thumbnail(
    backend: &impl ImageBackend,
    asset: &mut SourceAsset,
    tag: FormatTag,
    config: &ThumbnailConfig,
) -> Result<Option<SourceAsset>> {
    let decoded = backend.decode(asset, tag)?;
    match transform(decoded, config.bound, OutputFormat::Jpeg) {
        TransformedImage::Untouched { .. } => Ok(None),
        TransformedImage::Still { image, .. } => {
            let bytes = backend.encode(&image, OutputFormat::Jpeg, config.quality)?;
            Ok(Some(SourceAsset::from_bytes(
                thumbnail_name(asset.name()),
                bytes,
            )))
        }
    }
}
