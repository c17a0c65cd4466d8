//! # Upload Optimizer
//!
//! Fail-safe optimization for uploaded images. Give it a named byte stream
//! and it hands back a new named stream: scaled down to a bounded size and
//! re-encoded when the input is a raster image it understands.
//! If anything goes wrong along the way you get the original back, untouched.
//!
//! # Pipeline
//!
//! ```text
//! SourceAsset ─▶ classify ─▶ decode/probe ─▶ transform ─▶ encode ─▶ ProcessingOutcome
//!                  │ unsupported                                       ▲
//!                  └────────────────── passthrough ────────────────────┘
//! ```
//!
//! Everything from decode onward runs inside one guard
//! ([`pipeline::Optimizer::process`]), which maps decode errors, encode
//! errors, I/O errors and codec panics to a passthrough outcome. Thumbnails
//! are a separate, independently guarded step.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`asset`] | `SourceAsset` (named rewindable stream) and `ProcessingOutcome` |
//! | [`imaging`] | Classification, decoding, resize math, encode decision table, codec backend |
//! | [`pipeline`] | `Optimizer`: the infallible entry point and the fallback guard |
//! | [`hook`] | Idempotent optimize-on-save adapter for records with image fields |
//! | [`config`] | `EncodingPolicy` loading: stock defaults, `config.toml`, environment |
//! | [`output`] | CLI report formatting (text and JSON) |
//!
//! # Design Decisions
//!
//! ## One Immutable Policy
//!
//! [`config::EncodingPolicy`] is built once and passed by reference into every
//! call. There is no global state, so an `&Optimizer` can be shared across
//! worker threads freely.
//!
//! ## Animations Are Never Re-encoded
//!
//! None of the encoders used here can write multi-frame output, so animated
//! files are only probed and always kept as-is. Animated GIFs report their
//! dimensions; APNG and animated WebP are treated like unsupported input and
//! report none.
//!
//! ## WebP Idempotence
//!
//! A WebP that already fits the bounds is kept as-is rather than re-encoded,
//! and the upload hook treats a `.webp` name (or its explicit `optimized`
//! marker) as done. Running the pipeline or the hook twice changes nothing
//! the second time.

pub mod asset;
pub mod config;
pub mod hook;
pub mod imaging;
pub mod output;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;
