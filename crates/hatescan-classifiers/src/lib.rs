//! hatescan Classifiers
//!
//! Hate-speech classification over sentences and transcript segments.
//!
//! Three interchangeable adapters implement [`Classifier`]:
//! - [`DistilBertClassifier`]: local DistilBERT, HATE_SPEECH / OFFENSIVE / NEITHER
//! - [`RationaleClassifier`]: local BERT trained with token rationales, NORMAL / ABUSIVE
//! - [`RemotePromptClassifier`]: generative model behind an Ollama endpoint, NORMAL / ABUSIVE
//!
//! The [`Orchestrator`] runs one of them over segments or over the sentences
//! produced by the [`Segmenter`].

pub mod annotator;
pub mod classifier;
pub mod config;
pub mod distilbert;
pub mod encoding;
pub mod orchestrator;
pub mod rationale;
pub mod registry;
pub mod remote;
pub mod reply;
pub mod segmenter;

pub use annotator::{annotate, AnnotatedSegment, Annotation};
pub use classifier::Classifier;
pub use config::{ClassifierKind, ClassifierSettings, LocalModelSettings, RemotePromptSettings};
pub use distilbert::DistilBertClassifier;
pub use orchestrator::{Orchestrator, ReportSummary, SentenceReport, SentenceResult};
pub use rationale::RationaleClassifier;
pub use registry::build_classifier;
pub use remote::RemotePromptClassifier;
pub use reply::ReplyParser;
pub use segmenter::{split_into_sentences, Segmenter};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::Classifier;
    pub use crate::config::{ClassifierKind, ClassifierSettings};
    pub use crate::orchestrator::{Orchestrator, SentenceReport};
    pub use crate::registry::build_classifier;
    pub use hatescan_core::{ClassificationResult, TextSegment};
}
