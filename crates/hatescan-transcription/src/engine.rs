//! Speech engine seam

use hatescan_core::{Result, TranscriptionSegment};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Decoding parameters for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Beam width; 1 decodes greedily
    pub beam_size: usize,

    /// Language hint; detected when absent
    pub language: Option<String>,

    /// Produce per-word timings
    pub word_timestamps: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            beam_size: 5,
            language: None,
            word_timestamps: true,
        }
    }
}

/// Whole-file metadata known before segments are produced
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeInfo {
    pub language: String,
    pub language_probability: f64,
    /// Seconds
    pub duration: f64,
}

/// Lazy, time-ordered segments of one file
pub type SegmentStream = Box<dyn Iterator<Item = Result<TranscriptionSegment>> + Send>;

/// A loaded speech-to-text model
pub trait SpeechEngine: Send + Sync {
    /// Start decoding `path`. Segments are produced as the stream is pulled.
    fn transcribe(&self, path: &Path, options: &DecodeOptions) -> Result<(DecodeInfo, SegmentStream)>;

    /// Model identifier for logs and health output
    fn name(&self) -> &str;
}
