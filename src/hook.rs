//! Optimize-on-save hook for records with image fields.
//!
//! The host calls [`UploadHook::on_field_changed`] once per changed image
//! field, before committing. The hook runs the pipeline and, if that produced
//! a differently named artifact, swaps the field's content for it. It does
//! not persist anything and never fails: every problem is logged and the
//! field is left as it was.
//!
//! Running the hook twice on the same field is a no-op the second time. A
//! field counts as already optimized when its `optimized` marker is set or
//! its stored name ends in `.webp`.

use crate::asset::SourceAsset;
use crate::config::EncodingPolicy;
use crate::imaging::format::extension_of;
use crate::imaging::{ImageBackend, RustBackend};
use crate::pipeline::Optimizer;

/// Extensions the hook will try to optimize.
///
/// Broader than what the pipeline decodes: `bmp` and `tiff` reach the
/// pipeline and pass through it unchanged.
pub const OPTIMIZABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "heif", "bmp", "tiff"];

/// An image-valued field on a record: stored name plus content.
#[derive(Debug, Default)]
pub struct ImageField {
    name: String,
    content: Option<SourceAsset>,
    optimized: bool,
}

impl ImageField {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A freshly uploaded file, stored under the asset's own name.
    pub fn uploaded(asset: SourceAsset) -> Self {
        let name = asset.name().to_string();
        Self::stored(name, asset)
    }

    /// A file stored under `name` (which may include an upload directory).
    pub fn stored(name: impl Into<String>, asset: SourceAsset) -> Self {
        Self {
            name: name.into(),
            content: Some(asset),
            optimized: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> Option<&SourceAsset> {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> Option<&mut SourceAsset> {
        self.content.as_mut()
    }

    pub fn take_content(&mut self) -> Option<SourceAsset> {
        self.content.take()
    }

    pub fn is_optimized(&self) -> bool {
        self.optimized
    }

    /// Point the field at a new file and mark it optimized.
    pub fn replace(&mut self, artifact: SourceAsset) {
        self.name = artifact.name().to_string();
        self.content = Some(artifact);
        self.optimized = true;
    }
}

/// A record the hook can reach into.
pub trait ImageRecord {
    fn image_field_mut(&mut self, field: &str) -> Option<&mut ImageField>;

    /// Short description for log lines.
    fn label(&self) -> String {
        "record".to_string()
    }
}

/// Why the hook did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoSuchField,
    EmptyField,
    EmptyName,
    AlreadyOptimized,
    NotOptimizable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Skipped(SkipReason),
    /// The pipeline ran but the artifact kept the stored name.
    Unchanged,
    Replaced { from: String, to: String },
    /// Something went wrong; the field was left untouched.
    Failed(String),
}

/// The optimize-on-save hook.
pub struct UploadHook<B: ImageBackend = RustBackend> {
    optimizer: Optimizer<B>,
}

impl UploadHook<RustBackend> {
    pub fn new(policy: EncodingPolicy) -> Self {
        Self::with_optimizer(Optimizer::new(policy))
    }
}

impl<B: ImageBackend> UploadHook<B> {
    pub fn with_optimizer(optimizer: Optimizer<B>) -> Self {
        Self { optimizer }
    }

    pub fn optimizer(&self) -> &Optimizer<B> {
        &self.optimizer
    }

    /// Optimize `field` on `record` in place.
    pub fn on_field_changed<R: ImageRecord + ?Sized>(
        &self,
        record: &mut R,
        field: &str,
    ) -> HookOutcome {
        let label = record.label();
        let outcome = match record.image_field_mut(field) {
            Some(slot) => self.optimize_field(slot),
            None => HookOutcome::Skipped(SkipReason::NoSuchField),
        };
        match &outcome {
            HookOutcome::Replaced { from, to } => {
                tracing::info!(record = %label, field, from = %from, to = %to, "replaced image with optimized version");
            }
            HookOutcome::Failed(error) => {
                tracing::warn!(record = %label, field, error = %error, "image optimization hook failed");
            }
            HookOutcome::Skipped(reason) => {
                tracing::debug!(record = %label, field, ?reason, "image optimization skipped");
            }
            HookOutcome::Unchanged => {
                tracing::debug!(record = %label, field, "image left unchanged");
            }
        }
        outcome
    }

    /// Run [`on_field_changed`](Self::on_field_changed) for several fields.
    pub fn on_fields_changed<R: ImageRecord + ?Sized>(
        &self,
        record: &mut R,
        fields: &[&str],
    ) -> Vec<HookOutcome> {
        fields
            .iter()
            .map(|field| self.on_field_changed(record, field))
            .collect()
    }

    fn optimize_field(&self, slot: &mut ImageField) -> HookOutcome {
        if slot.content.is_none() {
            return HookOutcome::Skipped(SkipReason::EmptyField);
        }
        if slot.name.is_empty() {
            return HookOutcome::Skipped(SkipReason::EmptyName);
        }
        if slot.optimized || slot.name.to_ascii_lowercase().ends_with(".webp") {
            return HookOutcome::Skipped(SkipReason::AlreadyOptimized);
        }
        let optimizable = extension_of(&slot.name)
            .is_some_and(|ext| OPTIMIZABLE_EXTENSIONS.contains(&ext.as_str()));
        if !optimizable {
            return HookOutcome::Skipped(SkipReason::NotOptimizable);
        }

        let Some(mut content) = slot.content.take() else {
            return HookOutcome::Skipped(SkipReason::EmptyField);
        };
        if let Err(err) = content.rewind() {
            slot.content = Some(content);
            return HookOutcome::Failed(format!("could not rewind upload: {err}"));
        }

        let stored = slot.name.clone();
        let outcome = self.optimizer.process(content.renamed(stored.clone()));
        if outcome.artifact.name() == stored {
            let mut original = outcome.into_original();
            if let Err(err) = original.rewind() {
                tracing::warn!(name = %stored, error = %err, "could not rewind restored upload");
            }
            slot.content = Some(original);
            return HookOutcome::Unchanged;
        }

        let to = outcome.artifact.name().to_string();
        slot.replace(outcome.artifact);
        HookOutcome::Replaced { from: stored, to }
    }
}
