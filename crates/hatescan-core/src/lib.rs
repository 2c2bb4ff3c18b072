//! hatescan Core
//!
//! Types, errors and utilities shared across the hatescan crates.
//!
//! This crate provides:
//! - Text segments, label taxonomies and classification results
//! - Transcription result types
//! - Error types and result handling
//! - The lazy model lifecycle used by every model-backed component
//! - Model directory resolution against the Hugging Face Hub

pub mod device;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod types;

pub use device::device_from_str;
pub use error::{Error, Result};
pub use hub::{resolve_model_dir, HubRepo, ModelLocation};
pub use lifecycle::{ModelSlot, ModelState};
pub use types::{
    ClassLabel, ClassificationResult, DecisionSource, SegmentAnalysis, Taxonomy, TextSegment,
    Transcription, TranscriptionSegment, WordTimestamp,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::lifecycle::{ModelSlot, ModelState};
    pub use crate::types::{
        ClassLabel, ClassificationResult, DecisionSource, SegmentAnalysis, Taxonomy, TextSegment,
    };
}
