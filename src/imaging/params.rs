//! Parameter types for image operations.
//!
//! These types describe *what* to produce, not *how*. They are the vocabulary
//! shared between the decision logic in [`operations`](super::operations) and
//! the pixel work in the [`backend`](super::backend).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`Envelope`]: A width × height box an image must fit inside.
//! - [`ColorMode`]: Channel layout of a decoded image.
//! - [`OutputFormat`]: The container an artifact is actually encoded into.

use serde::Serialize;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub(crate) fn as_u8(self) -> u8 {
        self.0 as u8
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(85)
    }
}

/// Maximum width/height box. Images are scaled to fit inside it, never
/// enlarged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub width: u32,
    pub height: u32,
}

impl Envelope {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when `(width, height)` already fits without scaling.
    pub fn contains(self, width: u32, height: u32) -> bool {
        width <= self.width && height <= self.height
    }
}

/// Channel layout of a decoded image.
///
/// Gray+alpha sources are reported as [`ColorMode::TruecolorAlpha`]: what
/// matters downstream is whether an alpha channel has to be flattened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Truecolor,
    TruecolorAlpha,
    IndexedPalette,
    Grayscale,
}

impl ColorMode {
    /// Classify a decoder color type. `palette` comes from the container
    /// header, since decoders expand palettes before handing out pixels.
    pub fn from_color_type(color: image::ColorType, palette: bool) -> Self {
        if palette {
            ColorMode::IndexedPalette
        } else if color.has_alpha() {
            ColorMode::TruecolorAlpha
        } else if !color.has_color() {
            ColorMode::Grayscale
        } else {
            ColorMode::Truecolor
        }
    }

    /// Whether an opaque target needs this mode flattened onto a background.
    pub fn needs_flattening(self) -> bool {
        matches!(self, ColorMode::TruecolorAlpha | ColorMode::IndexedPalette)
    }
}

/// Container an artifact is encoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl OutputFormat {
    /// Extension used when an artifact has to be renamed into this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
            OutputFormat::WebP => "webp",
        }
    }

    pub fn supports_alpha(self) -> bool {
        !matches!(self, OutputFormat::Jpeg)
    }
}
