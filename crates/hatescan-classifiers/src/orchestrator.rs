//! Per-segment classification loop

use crate::annotator::{annotate, Annotation};
use crate::classifier::Classifier;
use crate::segmenter::Segmenter;
use hatescan_core::{
    ClassLabel, ClassificationResult, Result, SegmentAnalysis, TextSegment,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Classification of one sentence of a text block
#[derive(Debug, Clone, Serialize)]
pub struct SentenceResult {
    /// 1-based line number
    pub line_number: usize,
    pub sentence: String,
    pub result: ClassificationResult,
}

/// Label counts and concerning lines of a text block
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    /// Label counts in first-seen order
    pub label_counts: Vec<(ClassLabel, usize)>,
    /// Line numbers whose result is concerning
    pub concerning_lines: Vec<usize>,
}

impl ReportSummary {
    fn record(&mut self, line_number: usize, result: &ClassificationResult) {
        match self
            .label_counts
            .iter_mut()
            .find(|(label, _)| *label == result.class_label)
        {
            Some((_, count)) => *count += 1,
            None => self.label_counts.push((result.class_label, 1)),
        }

        if result.is_concerning {
            self.concerning_lines.push(line_number);
        }
    }

    /// Count for one label
    pub fn count(&self, label: ClassLabel) -> usize {
        self.label_counts
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }
}

/// Ordered per-sentence results plus their summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct SentenceReport {
    pub sentences: Vec<SentenceResult>,
    pub summary: ReportSummary,
}

impl SentenceReport {
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }
}

/// Runs one classifier over segments or sentences, strictly in order.
///
/// There is one classifier call per item and the first failure aborts the
/// whole batch.
pub struct Orchestrator {
    classifier: Arc<dyn Classifier>,
    segmenter: Segmenter,
}

impl Orchestrator {
    pub fn new(classifier: Arc<dyn Classifier>) -> Result<Self> {
        Ok(Self {
            classifier,
            segmenter: Segmenter::new()?,
        })
    }

    /// The classifier behind this orchestrator
    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    /// Classify every segment, keeping input order and positional metadata
    pub async fn analyze_segments(&self, segments: &[TextSegment]) -> Result<Vec<SegmentAnalysis>> {
        let annotation = self.classifier.annotation();
        let mut analyses = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            let input = annotation.apply(i + 1, &segment.text);
            let result = self.classifier.classify(&input).await?;
            debug!(
                "Segment {}: {} ({:.3})",
                i + 1,
                result.class_label,
                result.confidence
            );

            analyses.push(SegmentAnalysis {
                segment: segment.clone(),
                result,
            });
        }

        Ok(analyses)
    }

    /// Split a text block into sentences and classify each one
    pub async fn analyze_text(&self, text: &str) -> Result<SentenceReport> {
        let sentences = self.segmenter.split(text);
        let mut report = SentenceReport::default();

        let inputs: Vec<(usize, String, String)> = match self.classifier.annotation() {
            Annotation::Sequential => annotate(&sentences)
                .into_iter()
                .map(|a| (a.index, a.sentence, a.text))
                .collect(),
            Annotation::None => sentences
                .into_iter()
                .enumerate()
                .map(|(i, s)| (i + 1, s.clone(), s))
                .collect(),
        };

        for (line_number, sentence, input) in inputs {
            let result = self.classifier.classify(&input).await?;
            debug!("Line {}: {} <- {:?}", line_number, result.class_label, input);

            report.summary.record(line_number, &result);
            report.sentences.push(SentenceResult {
                line_number,
                sentence,
                result,
            });
        }

        Ok(report)
    }
}
