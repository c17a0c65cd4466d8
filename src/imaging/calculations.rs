//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::Envelope;

/// Calculate the size of an image scaled down to fit inside `bound`.
///
/// Aspect ratio is preserved and the image is never enlarged: sources that
/// already fit come back unchanged. When scaling happens, the constraining
/// edge lands exactly on its bound and the other edge is rounded to the
/// nearest pixel (never below 1).
///
/// # Examples
/// ```
/// # use upload_optimizer::imaging::{Envelope, fit_within};
/// // 4000x3000 into a 300x300 box → 300x225
/// assert_eq!(fit_within((4000, 3000), Envelope::new(300, 300)), (300, 225));
///
/// // Already small enough → unchanged
/// assert_eq!(fit_within((64, 64), Envelope::new(300, 300)), (64, 64));
/// ```
pub fn fit_within(source: (u32, u32), bound: Envelope) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 || bound.contains(src_w, src_h) {
        return source;
    }
    let (max_w, max_h) = (bound.width.max(1), bound.height.max(1));

    // Compare src_w/src_h against max_w/max_h without floating point
    let width_constrained = src_w as u64 * max_h as u64 >= src_h as u64 * max_w as u64;

    if width_constrained {
        let h = (src_h as f64 * max_w as f64 / src_w as f64).round() as u32;
        (max_w, h.clamp(1, max_h))
    } else {
        let w = (src_w as f64 * max_h as f64 / src_h as f64).round() as u32;
        (w.clamp(1, max_w), max_h)
    }
}

/// True when an image of `source` size exceeds `bound` on either edge.
pub fn exceeds(source: (u32, u32), bound: Envelope) -> bool {
    !bound.contains(source.0, source.1)
}
