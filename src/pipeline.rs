//! The public entry point: classify, optimize, and fall back safely.
//!
//! [`Optimizer::process`] never fails. Everything from decoding onward runs
//! inside one guard. Codec errors and codec panics end the same way: the
//! caller gets its original asset back, rewound, with no dimensions.

use crate::asset::{ProcessingOutcome, SourceAsset};
use crate::config::EncodingPolicy;
use crate::imaging::{
    BackendError, Classification, FormatTag, ImageBackend, Optimized, RustBackend, classify,
    create_thumbnail, optimize_image,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use thiserror::Error;

/// Failures absorbed by the guard. Never escapes [`Optimizer::process`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec panicked: {0}")]
    Panicked(String),
}

/// Runs the pipeline with one immutable policy.
///
/// Cheap to share: `&Optimizer` is `Sync` and can be used from any number of
/// worker threads at once.
pub struct Optimizer<B: ImageBackend = RustBackend> {
    backend: B,
    policy: EncodingPolicy,
}

impl Optimizer<RustBackend> {
    pub fn new(policy: EncodingPolicy) -> Self {
        Self::with_backend(RustBackend::new(), policy)
    }
}

impl<B: ImageBackend> Optimizer<B> {
    pub fn with_backend(backend: B, policy: EncodingPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn policy(&self) -> &EncodingPolicy {
        &self.policy
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Optimize one upload.
    ///
    /// Unsupported names pass straight through without being read. For
    /// supported ones, any failure yields the original asset.
    pub fn process(&self, mut asset: SourceAsset) -> ProcessingOutcome {
        let tag = match classify(asset.name()) {
            Classification::Supported(tag) => tag,
            Classification::Unsupported => {
                tracing::debug!(name = asset.name(), "not a supported image, passing through");
                return ProcessingOutcome::passthrough(asset);
            }
        };

        match guarded(|| self.try_process(&mut asset, tag)) {
            Ok(Optimized::Preserve { width, height }) => {
                tracing::debug!(name = asset.name(), width, height, "kept original");
                ProcessingOutcome::preserved(asset, width, height)
            }
            Ok(Optimized::Unsupported) => {
                tracing::debug!(name = asset.name(), "unsupported animation, passing through");
                ProcessingOutcome::passthrough(asset)
            }
            Ok(Optimized::Encoded {
                name,
                bytes,
                format,
                width,
                height,
                was_resized,
            }) => {
                tracing::debug!(
                    from = asset.name(),
                    to = %name,
                    ?format,
                    width,
                    height,
                    was_resized,
                    bytes = bytes.len(),
                    "encoded"
                );
                ProcessingOutcome::encoded(asset, name, bytes, format, (width, height), was_resized)
            }
            Err(err) => {
                tracing::warn!(name = asset.name(), format = ?tag, error = %err, "optimization failed, keeping original");
                ProcessingOutcome::passthrough(asset)
            }
        }
    }

    /// The unguarded pipeline body.
    pub fn try_process(
        &self,
        asset: &mut SourceAsset,
        tag: FormatTag,
    ) -> Result<Optimized, PipelineError> {
        asset.rewind()?;
        let result = optimize_image(&self.backend, asset, tag, &self.policy.optimize_settings())?;
        asset.rewind()?;
        Ok(result)
    }

    /// Build a thumbnail, or `None` for animated, unsupported, or broken
    /// inputs. Leaves `asset` rewound.
    pub fn thumbnail(&self, asset: &mut SourceAsset) -> Option<SourceAsset> {
        let Classification::Supported(tag) = classify(asset.name()) else {
            return None;
        };
        let result = guarded(|| self.try_thumbnail(asset, tag));
        if let Err(err) = asset.rewind() {
            tracing::warn!(name = asset.name(), error = %err, "could not rewind after thumbnail");
        }
        match result {
            Ok(thumb) => thumb,
            Err(err) => {
                tracing::warn!(name = asset.name(), error = %err, "thumbnail failed");
                None
            }
        }
    }

    pub fn try_thumbnail(
        &self,
        asset: &mut SourceAsset,
        tag: FormatTag,
    ) -> Result<Option<SourceAsset>, PipelineError> {
        asset.rewind()?;
        Ok(create_thumbnail(
            &self.backend,
            asset,
            tag,
            &self.policy.thumbnail_config(),
        )?)
    }
}

/// Run `f`, turning a panic into [`PipelineError::Panicked`].
fn guarded<T>(f: impl FnOnce() -> Result<T, PipelineError>) -> Result<T, PipelineError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(PipelineError::Panicked(message))
    })
}
