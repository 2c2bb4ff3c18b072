//! Decoding of free-form generative model replies
//!
//! Two stages: a strict decode of the first flat `{...}` object in the reply,
//! then a keyword heuristic over the raw reply when the strict stage fails.
//! Heuristic results carry `DecisionSource::Fallback`.

use aho_corasick::AhoCorasick;
use hatescan_core::{ClassLabel, ClassificationResult, DecisionSource, Error, Result, Taxonomy};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

/// Reasoning attached to every heuristic result
pub const FALLBACK_REASONING: &str =
    "Fallback classification - model response was not in expected format";

const FALLBACK_INDICATORS: [&str; 4] = ["abusive", "hate", "offensive", "harassment"];
const FALLBACK_ABUSIVE_CONFIDENCE: f32 = 0.6;
const FALLBACK_NORMAL_CONFIDENCE: f32 = 0.7;
const DEFAULT_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    confidence: Option<Value>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Turns a model reply into a binary classification
pub struct ReplyParser {
    object: Regex,
    indicators: AhoCorasick,
}

impl ReplyParser {
    pub fn new() -> Result<Self> {
        let object = Regex::new(r"\{[^}]+\}")
            .map_err(|e| Error::classifier(format!("Failed to compile reply regex: {}", e)))?;

        let indicators = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(FALLBACK_INDICATORS)
            .map_err(|e| Error::classifier(format!("Failed to build indicator matcher: {}", e)))?;

        Ok(Self { object, indicators })
    }

    /// Classify a reply, falling back to the keyword heuristic when the
    /// strict decode fails. Never fails on malformed replies.
    pub fn parse(&self, reply: &str) -> Result<ClassificationResult> {
        match self.parse_strict(reply) {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!("Degraded classification, {}: {:?}", e, reply);
                self.fallback(reply)
            }
        }
    }

    /// Decode the first JSON object of the reply. Fails with `Error::Parse`.
    pub fn parse_strict(&self, reply: &str) -> Result<ClassificationResult> {
        let object = self
            .object
            .find(reply)
            .ok_or_else(|| Error::parse("no JSON object in model reply"))?;

        let verdict: Verdict = serde_json::from_str(object.as_str())
            .map_err(|e| Error::parse(format!("invalid JSON in model reply: {}", e)))?;

        let label = match verdict.class.as_deref().map(str::to_uppercase).as_deref() {
            Some("ABUSIVE") => ClassLabel::Abusive,
            _ => ClassLabel::Normal,
        };

        let confidence = match verdict.confidence {
            None => DEFAULT_CONFIDENCE,
            Some(value) => parse_confidence(&value)?,
        };

        let result = ClassificationResult::new(
            Taxonomy::Binary,
            binary_id(label),
            confidence,
            DecisionSource::Model,
        )?;

        Ok(result.with_reasoning(verdict.reasoning.unwrap_or_default()))
    }

    /// Keyword heuristic over the raw reply
    pub fn fallback(&self, reply: &str) -> Result<ClassificationResult> {
        let (label, confidence) = if self.indicators.is_match(reply) {
            (ClassLabel::Abusive, FALLBACK_ABUSIVE_CONFIDENCE)
        } else {
            (ClassLabel::Normal, FALLBACK_NORMAL_CONFIDENCE)
        };

        Ok(ClassificationResult::new(
            Taxonomy::Binary,
            binary_id(label),
            confidence,
            DecisionSource::Fallback,
        )?
        .with_reasoning(FALLBACK_REASONING))
    }
}

fn binary_id(label: ClassLabel) -> usize {
    Taxonomy::Binary.class_id(label).unwrap_or(0)
}

fn parse_confidence(value: &Value) -> Result<f32> {
    let confidence = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    confidence
        .filter(|c| c.is_finite())
        .map(|c| c as f32)
        .ok_or_else(|| Error::parse(format!("non-numeric confidence {}", value)))
}
