//! Classifier construction from settings

use crate::classifier::Classifier;
use crate::config::{ClassifierKind, ClassifierSettings};
use crate::distilbert::DistilBertClassifier;
use crate::rationale::RationaleClassifier;
use crate::remote::RemotePromptClassifier;
use hatescan_core::Result;
use std::sync::Arc;
use tracing::info;

/// Build the classifier selected by `settings.kind`.
///
/// Nothing is loaded here; models load on the first `load` or `classify`.
pub fn build_classifier(settings: &ClassifierSettings) -> Result<Arc<dyn Classifier>> {
    let classifier: Arc<dyn Classifier> = match settings.kind {
        ClassifierKind::Distilbert => {
            Arc::new(DistilBertClassifier::new(settings.distilbert.clone()))
        }
        ClassifierKind::BertRationale => {
            Arc::new(RationaleClassifier::new(settings.rationale.clone()))
        }
        ClassifierKind::RemotePrompt => {
            Arc::new(RemotePromptClassifier::new(settings.remote.clone())?)
        }
    };

    info!(
        "Selected classifier '{}' ({})",
        classifier.name(),
        settings.kind
    );

    Ok(classifier)
}
