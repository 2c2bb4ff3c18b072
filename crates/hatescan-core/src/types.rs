//! Core types for hatescan

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit of text submitted for independent classification.
///
/// `start`/`end` carry audio timestamps when the segment came out of a
/// transcription; they are absent for plain sentence input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    /// Segment text
    pub text: String,

    /// Start time in seconds (audio-derived segments only)
    #[serde(default)]
    pub start: Option<f64>,

    /// End time in seconds (audio-derived segments only)
    #[serde(default)]
    pub end: Option<f64>,
}

impl TextSegment {
    /// Create a segment without timing information
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            start: None,
            end: None,
        }
    }

    /// Create a segment spanning `start..end` seconds of audio
    pub fn timed(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Every label any classifier in this workspace can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassLabel {
    HateSpeech,
    Offensive,
    Neither,
    Normal,
    Abusive,
}

impl ClassLabel {
    /// Wire name of the label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HateSpeech => "HATE_SPEECH",
            Self::Offensive => "OFFENSIVE",
            Self::Neither => "NEITHER",
            Self::Normal => "NORMAL",
            Self::Abusive => "ABUSIVE",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed label set of a classifier, indexed by class id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Taxonomy {
    /// 0 = HATE_SPEECH, 1 = OFFENSIVE, 2 = NEITHER
    ThreeWay,
    /// 0 = NORMAL, 1 = ABUSIVE
    Binary,
}

const THREE_WAY_LABELS: [ClassLabel; 3] =
    [ClassLabel::HateSpeech, ClassLabel::Offensive, ClassLabel::Neither];
const BINARY_LABELS: [ClassLabel; 2] = [ClassLabel::Normal, ClassLabel::Abusive];

impl Taxonomy {
    /// Labels in class-id order
    pub fn labels(&self) -> &'static [ClassLabel] {
        match self {
            Self::ThreeWay => &THREE_WAY_LABELS,
            Self::Binary => &BINARY_LABELS,
        }
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.labels().len()
    }

    /// Always false; every taxonomy has at least two classes
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Label for a class id, if the id is valid
    pub fn label(&self, class_id: usize) -> Option<ClassLabel> {
        self.labels().get(class_id).copied()
    }

    /// Class id of a label, if the label belongs to this taxonomy
    pub fn class_id(&self, label: ClassLabel) -> Option<usize> {
        self.labels().iter().position(|l| *l == label)
    }

    /// Whether a class id falls in the harmful subset of this taxonomy
    pub fn is_concerning(&self, class_id: usize) -> bool {
        match self {
            Self::ThreeWay => class_id == 0 || class_id == 1,
            Self::Binary => class_id == 1,
        }
    }
}

/// Where a classification decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// Primary model output
    Model,
    /// Keyword heuristic used when the model reply could not be decoded
    Fallback,
}

/// Result of classifying one piece of text
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    /// Predicted label
    pub class_label: ClassLabel,

    /// Index of the label in the producing classifier's taxonomy
    pub class_id: usize,

    /// Confidence score (0.0-1.0)
    pub confidence: f32,

    /// Derived from `class_id`
    pub is_concerning: bool,

    /// Primary model decision or degraded heuristic
    pub source: DecisionSource,

    /// Free-form explanation (remote prompt classifier only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// Create a result for `class_id` of `taxonomy`.
    ///
    /// Fails when the id does not index the taxonomy. Confidence is clamped
    /// to `[0, 1]`; NaN becomes 0.
    pub fn new(
        taxonomy: Taxonomy,
        class_id: usize,
        confidence: f32,
        source: DecisionSource,
    ) -> Result<Self> {
        let class_label = taxonomy.label(class_id).ok_or_else(|| {
            Error::classifier(format!(
                "class id {} is outside the {:?} label set",
                class_id, taxonomy
            ))
        })?;

        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };

        Ok(Self {
            class_label,
            class_id,
            confidence,
            is_concerning: taxonomy.is_concerning(class_id),
            source,
            reasoning: None,
            latency_us: 0,
        })
    }

    /// Pick the most probable class from a softmax output
    pub fn from_probabilities(taxonomy: Taxonomy, probabilities: &[f32]) -> Result<Self> {
        if probabilities.len() != taxonomy.len() {
            return Err(Error::classifier(format!(
                "expected {} class probabilities, model produced {}",
                taxonomy.len(),
                probabilities.len()
            )));
        }

        let (class_id, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or((0, 0.0));

        Self::new(taxonomy, class_id, confidence, DecisionSource::Model)
    }

    /// Attach a reasoning string
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Attach the measured latency
    pub fn with_latency_us(mut self, latency_us: u64) -> Self {
        self.latency_us = latency_us;
        self
    }

    /// True when the result came from the degraded fallback path
    pub fn is_degraded(&self) -> bool {
        self.source == DecisionSource::Fallback
    }
}

/// A classified segment: the input's positional metadata plus the result
#[derive(Debug, Clone)]
pub struct SegmentAnalysis {
    pub segment: TextSegment,
    pub result: ClassificationResult,
}

/// Word-level timing inside a transcription segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub start: f64,
    pub end: f64,
    pub word: String,
}

/// One time-ordered segment of a transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTimestamp>>,
}

/// Complete transcription of one audio file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// Detected (or hinted) language code
    pub language: String,

    /// Confidence of the language detection
    pub language_probability: f64,

    /// Audio duration in seconds
    pub duration: f64,

    /// Segments in time order
    pub segments: Vec<TranscriptionSegment>,
}
