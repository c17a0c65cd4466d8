//! Pure Rust image backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, WebP) | `image::ImageReader` under [`image::Limits`] |
//! | Decode (HEIC/HEIF) | `libheif-rs`, only with the `heic` feature |
//! | Animation probe | `GifDecoder::into_frames` (first two frames), `PngDecoder::is_apng`, `WebPDecoder::has_animation` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (best compression, adaptive filter) |
//! | Encode → GIF | `image::codecs::gif::GifEncoder` (single frame) |
//! | Encode → WebP | `webp` crate (lossy libwebp; `image` only ships a lossless encoder) |

use super::backend::{BackendError, DecodedImage, ImageBackend};
use super::format::{FormatTag, sniff};
use super::params::{ColorMode, OutputFormat, Quality};
use crate::asset::SourceAsset;
use image::codecs::gif::{GifDecoder, GifEncoder};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngDecoder, PngEncoder};
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, Frame, ImageDecoder, ImageReader, Limits};
use std::io::Cursor;

/// Default cap on either edge of a decoded image.
pub const DEFAULT_MAX_DECODE_DIMENSION: u32 = 16_384;
/// Default cap on decoder allocations (512 MiB).
pub const DEFAULT_MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

/// PNG IHDR color type byte for indexed images.
const PNG_COLOR_TYPE_PALETTE: u8 = 3;
/// Offset of the color type byte: signature (8) + chunk length (4) + "IHDR"
/// (4) + width (4) + height (4) + bit depth (1).
const PNG_COLOR_TYPE_OFFSET: usize = 25;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone)]
pub struct RustBackend {
    max_dimension: u32,
    max_alloc: u64,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DECODE_DIMENSION,
            max_alloc: DEFAULT_MAX_DECODE_ALLOC,
        }
    }

    /// Backend with custom decoder resource limits.
    pub fn with_limits(max_dimension: u32, max_alloc: u64) -> Self {
        Self {
            max_dimension,
            max_alloc,
        }
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits.max_alloc = Some(self.max_alloc);
        limits
    }

    /// Probe whether the container holds more than one frame. Returns the
    /// canvas size and color mode when it does.
    fn probe_animation(
        &self,
        bytes: &[u8],
        format: FormatTag,
    ) -> Result<Option<(u32, u32, ColorMode)>, BackendError> {
        match format {
            FormatTag::Gif => {
                let mut decoder = GifDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
                decoder.set_limits(self.limits()).map_err(decode_err)?;
                let (width, height) = decoder.dimensions();
                // Two frames are enough to tell a still from an animation
                let frames = decoder
                    .into_frames()
                    .take(2)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(decode_err)?;
                Ok((frames.len() > 1).then_some((width, height, ColorMode::IndexedPalette)))
            }
            FormatTag::Png => {
                let decoder = PngDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
                if !decoder.is_apng().map_err(decode_err)? {
                    return Ok(None);
                }
                let (width, height) = decoder.dimensions();
                let mode = ColorMode::from_color_type(decoder.color_type(), png_has_palette(bytes));
                Ok(Some((width, height, mode)))
            }
            FormatTag::WebP => {
                let decoder = WebPDecoder::new(Cursor::new(bytes)).map_err(decode_err)?;
                if !decoder.has_animation() {
                    return Ok(None);
                }
                let (width, height) = decoder.dimensions();
                let mode = ColorMode::from_color_type(decoder.color_type(), false);
                Ok(Some((width, height, mode)))
            }
            FormatTag::Jpeg | FormatTag::Heif => Ok(None),
        }
    }

    fn decode_still(&self, bytes: &[u8], format: FormatTag) -> Result<DynamicImage, BackendError> {
        let Some(image_format) = format.image_format() else {
            return decode_heif(bytes);
        };
        let mut reader = ImageReader::with_format(Cursor::new(bytes), image_format);
        reader.limits(self.limits());
        reader.decode().map_err(decode_err)
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_err(e: image::ImageError) -> BackendError {
    BackendError::Decode(e.to_string())
}

fn encode_err(e: image::ImageError) -> BackendError {
    BackendError::Encode(e.to_string())
}

fn png_has_palette(bytes: &[u8]) -> bool {
    bytes.get(PNG_COLOR_TYPE_OFFSET) == Some(&PNG_COLOR_TYPE_PALETTE)
}

#[cfg(feature = "heic")]
fn decode_heif(bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    use image::{RgbImage, RgbaImage};
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let heif_err = |e: libheif_rs::HeifError| BackendError::Decode(format!("HEIF: {e}"));

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(bytes).map_err(heif_err)?;
    let handle = ctx.primary_image_handle().map_err(heif_err)?;
    let alpha = handle.has_alpha_channel();
    let chroma = if alpha { RgbChroma::Rgba } else { RgbChroma::Rgb };
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(chroma), None)
        .map_err(heif_err)?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| BackendError::Decode("HEIF: no interleaved plane".into()))?;
    let (width, height) = (plane.width, plane.height);
    let row_len = width as usize * if alpha { 4 } else { 3 };

    // Rows are padded to `stride`; copy them out tightly packed
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        let row = row
            .get(..row_len)
            .ok_or_else(|| BackendError::Decode("HEIF: short row".into()))?;
        pixels.extend_from_slice(row);
    }

    let image = if alpha {
        RgbaImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8)
    } else {
        RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
    };
    image.ok_or_else(|| BackendError::Decode("HEIF: plane size mismatch".into()))
}

#[cfg(not(feature = "heic"))]
fn decode_heif(_bytes: &[u8]) -> Result<DynamicImage, BackendError> {
    Err(BackendError::Decode(
        "HEIC support not compiled in (enable the `heic` feature)".into(),
    ))
}

fn encode_webp(image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let (width, height) = (image.width(), image.height());
    let memory = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height)
            .encode_simple(false, quality.value() as f32)
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height)
            .encode_simple(false, quality.value() as f32)
    };
    memory
        .map(|m| m.to_vec())
        .map_err(|e| BackendError::Encode(format!("WebP: {e:?}")))
}

impl ImageBackend for RustBackend {
    fn decode(
        &self,
        asset: &mut SourceAsset,
        hint: FormatTag,
    ) -> Result<DecodedImage, BackendError> {
        let bytes = asset.read_to_vec()?;
        let format = sniff(&bytes).unwrap_or(hint);
        if format != hint {
            tracing::debug!(name = asset.name(), ?hint, sniffed = ?format, "content does not match extension");
        }

        if let Some((width, height, mode)) = self.probe_animation(&bytes, format)? {
            return Ok(DecodedImage::animated(width, height, mode, format));
        }

        let palette = match format {
            FormatTag::Gif => true,
            FormatTag::Png => png_has_palette(&bytes),
            _ => false,
        };
        let image = self.decode_still(&bytes, format)?;
        Ok(DecodedImage::still(image, format, palette))
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let mut out = Vec::new();
        match format {
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut out, quality.as_u8());
                rgb.write_with_encoder(encoder).map_err(encode_err)?;
            }
            OutputFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut out,
                    CompressionType::Best,
                    PngFilter::Adaptive,
                );
                image.write_with_encoder(encoder).map_err(encode_err)?;
            }
            OutputFormat::Gif => {
                let mut encoder = GifEncoder::new(&mut out);
                encoder
                    .encode_frame(Frame::new(image.to_rgba8()))
                    .map_err(encode_err)?;
            }
            OutputFormat::WebP => return encode_webp(image, quality),
        }
        Ok(out)
    }
}
