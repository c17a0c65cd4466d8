//! Shared test utilities: in-memory image fixtures.
//!
//! Every fixture is generated on the fly with the `image` crate encoders, so
//! tests need no files on disk and each call returns identical bytes.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let asset = SourceAsset::from_bytes("photo.jpg", jpeg_bytes(400, 300));
//! let outcome = Optimizer::new(EncodingPolicy::default()).process(asset);
//! ```

use image::codecs::gif::{GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{Delay, Frame, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};

// =========================================================================
// Pixel sources
// =========================================================================

/// Gradient so encoders have something non-trivial to compress.
pub fn gradient_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Gradient with a transparent left half.
pub fn gradient_rgba(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let alpha = if x < width / 2 { 0 } else { 255 };
        Rgba([(x % 256) as u8, (y % 256) as u8, 64, alpha])
    })
}

// =========================================================================
// Encoded fixtures
// =========================================================================

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

pub fn png_rgb_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

pub fn png_rgba_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgba(width, height);
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    out
}

/// Lossless WebP (the only WebP encoder the `image` crate has).
pub fn webp_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = gradient_rgb(width, height);
    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// Single-frame GIF.
pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    animated_gif_bytes(width, height, 1)
}

/// Looping GIF with `frames` frames of alternating color.
pub fn animated_gif_bytes(width: u32, height: u32, frames: usize) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        if frames > 1 {
            encoder.set_repeat(Repeat::Infinite).unwrap();
        }
        for i in 0..frames {
            let shade = if i % 2 == 0 { 255 } else { 0 };
            let frame = RgbaImage::from_pixel(width, height, Rgba([shade, 0, 255 - shade, 255]));
            encoder
                .encode_frame(Frame::from_parts(frame, 0, 0, Delay::from_numer_denom_ms(100, 1)))
                .unwrap();
        }
    }
    out
}

/// Indexed PNG: left half opaque red, right half a fully transparent entry.
pub fn png_palette_bytes(width: u32, height: u32) -> Vec<u8> {
    let indices: Vec<u8> = (0..height)
        .flat_map(|_| (0..width).map(move |x| if x < width / 2 { 0 } else { 1 }))
        .collect();
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Indexed);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_palette(vec![255, 0, 0, 0, 0, 255]);
        encoder.set_trns(vec![255, 0]);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&indices).unwrap();
        writer.finish().unwrap();
    }
    out
}

/// APNG with `frames` RGBA frames.
pub fn apng_bytes(width: u32, height: u32, frames: u32) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_animated(frames, 0).unwrap();
        let mut writer = encoder.write_header().unwrap();
        for i in 0..frames {
            let shade = if i % 2 == 0 { 255 } else { 0 };
            let frame = RgbaImage::from_pixel(width, height, Rgba([shade, 0, 255 - shade, 255]));
            writer.write_image_data(frame.as_raw()).unwrap();
        }
        writer.finish().unwrap();
    }
    out
}

/// Two-frame animated WebP built around the lossless still from
/// [`webp_bytes`]: VP8X with the animation flag, ANIM, then two ANMF chunks.
pub fn animated_webp_bytes(width: u32, height: u32) -> Vec<u8> {
    fn u24(v: u32) -> [u8; 3] {
        let [a, b, c, _] = v.to_le_bytes();
        [a, b, c]
    }
    fn chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(fourcc);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(0);
        }
    }

    // Skip "RIFF", size and "WEBP": what remains is the VP8L chunk
    let still = webp_bytes(width, height);
    let frame_chunk = &still[12..];

    let mut vp8x = vec![0x02, 0, 0, 0];
    vp8x.extend_from_slice(&u24(width - 1));
    vp8x.extend_from_slice(&u24(height - 1));

    let mut anmf = Vec::new();
    anmf.extend_from_slice(&u24(0));
    anmf.extend_from_slice(&u24(0));
    anmf.extend_from_slice(&u24(width - 1));
    anmf.extend_from_slice(&u24(height - 1));
    anmf.extend_from_slice(&u24(100));
    anmf.push(0);
    anmf.extend_from_slice(frame_chunk);

    let mut body = b"WEBP".to_vec();
    chunk(&mut body, b"VP8X", &vp8x);
    chunk(&mut body, b"ANIM", &[255, 255, 255, 255, 0, 0]);
    chunk(&mut body, b"ANMF", &anmf);
    chunk(&mut body, b"ANMF", &anmf);

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}
