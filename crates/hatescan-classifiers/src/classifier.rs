//! Classifier trait shared by every adapter

use crate::annotator::Annotation;
use async_trait::async_trait;
use hatescan_core::{ClassificationResult, ModelState, Result, Taxonomy};

/// Capability interface for hate-speech classifiers.
///
/// Implementations own their model lifecycle: `classify` on an unloaded
/// classifier loads it first.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Load the model. Idempotent once ready.
    async fn load(&self) -> Result<()>;

    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Release the model
    async fn unload(&self);

    /// Current lifecycle state
    fn state(&self) -> ModelState;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Label set this classifier produces
    fn taxonomy(&self) -> Taxonomy;

    /// How sentences are decorated before they reach `classify`
    fn annotation(&self) -> Annotation {
        Annotation::None
    }
}
