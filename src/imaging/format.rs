//! Format classification: filename → supported raster format.
//!
//! [`classify`] is the gate in front of the pipeline. It looks only at the
//! name, never at the bytes, so it is cheap enough to run on every upload.
//! [`sniff`] is the decoder's second opinion from magic bytes.

use std::path::Path;

/// Whether HEIC/HEIF decoding was compiled in (cargo feature `heic`).
pub const HEIF_DECODING: bool = cfg!(feature = "heic");

/// Raster formats the pipeline knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    Jpeg,
    Png,
    Gif,
    WebP,
    Heif,
}

/// Result of [`classify`]. `Unsupported` is an expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Supported(FormatTag),
    Unsupported,
}

impl FormatTag {
    /// Map a lowercase extension (no dot) to a tag, regardless of which
    /// decoders are compiled in.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpg" | "jpeg" => Some(FormatTag::Jpeg),
            "png" => Some(FormatTag::Png),
            "gif" => Some(FormatTag::Gif),
            "webp" => Some(FormatTag::WebP),
            "heic" | "heif" => Some(FormatTag::Heif),
            _ => None,
        }
    }

    /// Matching `image` crate format. HEIF has none; it decodes through libheif.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            FormatTag::Jpeg => Some(image::ImageFormat::Jpeg),
            FormatTag::Png => Some(image::ImageFormat::Png),
            FormatTag::Gif => Some(image::ImageFormat::Gif),
            FormatTag::WebP => Some(image::ImageFormat::WebP),
            FormatTag::Heif => None,
        }
    }
}

/// Lowercased final extension of a filename, without the dot.
///
/// Dotfiles such as `.jpg` have no extension, matching how path libraries
/// treat them.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// Decide from the filename alone whether the pipeline should try to decode.
pub fn classify(name: &str) -> Classification {
    let Some(ext) = extension_of(name) else {
        return Classification::Unsupported;
    };
    match FormatTag::from_extension(&ext) {
        Some(FormatTag::Heif) if !HEIF_DECODING => Classification::Unsupported,
        Some(tag) => Classification::Supported(tag),
        None => Classification::Unsupported,
    }
}

/// Extensions [`classify`] accepts in this build.
pub fn supported_extensions() -> Vec<&'static str> {
    let mut exts = vec!["jpg", "jpeg", "png", "gif", "webp"];
    if HEIF_DECODING {
        exts.extend(["heic", "heif"]);
    }
    exts
}

/// Identify a format from the first bytes of a file.
///
/// Needs at most 12 bytes. Returns `None` for anything unrecognized, in which
/// case the decoder falls back to the extension-derived tag.
pub fn sniff(header: &[u8]) -> Option<FormatTag> {
    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    const HEIF_BRANDS: &[&[u8; 4]] = &[b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1"];

    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(FormatTag::Jpeg);
    }
    if header.starts_with(PNG_SIGNATURE) {
        return Some(FormatTag::Png);
    }
    if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        return Some(FormatTag::Gif);
    }
    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        return Some(FormatTag::WebP);
    }
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        let brand = &header[8..12];
        if HEIF_BRANDS.iter().any(|b| b.as_slice() == brand) {
            return Some(FormatTag::Heif);
        }
    }
    None
}
