//! Mock classifiers for testing
//!
//! Configurable implementations of the Classifier trait used to exercise
//! the orchestrator's ordering, annotation and error handling.

use async_trait::async_trait;
use hatescan_classifiers::{Annotation, Classifier, Orchestrator};
use hatescan_core::{
    ClassLabel, ClassificationResult, DecisionSource, ModelState, Result, Taxonomy, TextSegment,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A configurable mock classifier for testing
pub struct MockClassifier {
    name: String,
    taxonomy: Taxonomy,
    annotation: Annotation,
    simulated_latency: Option<Duration>,
    call_count: AtomicU32,
    inputs: Mutex<Vec<String>>,
}

impl MockClassifier {
    /// Create a new mock classifier with the given name
    pub fn new(name: &str, taxonomy: Taxonomy) -> Self {
        Self {
            name: name.to_string(),
            taxonomy,
            annotation: Annotation::None,
            simulated_latency: None,
            call_count: AtomicU32::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Set the annotation policy this classifier asks for
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotation = annotation;
        self
    }

    /// Set simulated latency for this classifier
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.simulated_latency = Some(latency);
        self
    }

    /// Get the number of times classify was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Texts received by classify, in call order
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn load(&self) -> Result<()> {
        Ok(())
    }

    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        self.inputs.lock().unwrap().push(text.to_string());

        if let Some(latency) = self.simulated_latency {
            tokio::time::sleep(latency).await;
        }

        // Dynamic labelling based on text content
        let lowered = text.to_lowercase();
        let label = match self.taxonomy {
            Taxonomy::ThreeWay if lowered.contains("hate") => ClassLabel::HateSpeech,
            Taxonomy::ThreeWay if lowered.contains("worst") => ClassLabel::Offensive,
            Taxonomy::ThreeWay => ClassLabel::Neither,
            Taxonomy::Binary if lowered.contains("worst") || lowered.contains("hate") => {
                ClassLabel::Abusive
            }
            Taxonomy::Binary => ClassLabel::Normal,
        };

        let class_id = self.taxonomy.class_id(label).unwrap_or(0);
        ClassificationResult::new(self.taxonomy, class_id, 0.9, DecisionSource::Model)
    }

    async fn unload(&self) {}

    fn state(&self) -> ModelState {
        ModelState::Ready
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn taxonomy(&self) -> Taxonomy {
        self.taxonomy
    }

    fn annotation(&self) -> Annotation {
        self.annotation
    }
}

/// A classifier that fails on a chosen call - for testing error paths
pub struct FailingClassifier {
    fail_on_call: u32,
    call_count: AtomicU32,
}

impl FailingClassifier {
    /// Fail on the `n`th call (1-based)
    pub fn on_call(n: u32) -> Self {
        Self {
            fail_on_call: n,
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Classifier for FailingClassifier {
    async fn load(&self) -> Result<()> {
        Ok(())
    }

    async fn classify(&self, _text: &str) -> Result<ClassificationResult> {
        let call = self.call_count.fetch_add(1, Ordering::Relaxed) + 1;
        if call == self.fail_on_call {
            return Err(hatescan_core::Error::classifier("Simulated classifier failure"));
        }
        ClassificationResult::new(Taxonomy::Binary, 0, 0.8, DecisionSource::Model)
    }

    async fn unload(&self) {}

    fn state(&self) -> ModelState {
        ModelState::Ready
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn taxonomy(&self) -> Taxonomy {
        Taxonomy::Binary
    }
}

fn timed_segments() -> Vec<TextSegment> {
    vec![
        TextSegment::timed("Good morning everyone.", 0.0, 1.5),
        TextSegment::timed("This is the worst thing ever!", 1.5, 3.25),
        TextSegment::timed("See you tomorrow.", 3.25, 4.0),
    ]
}

#[tokio::test]
async fn test_two_sentence_text_with_sequential_markers() {
    let classifier = Arc::new(
        MockClassifier::new("three-way", Taxonomy::ThreeWay)
            .with_annotation(Annotation::Sequential),
    );
    let orchestrator = Orchestrator::new(classifier.clone()).unwrap();

    let report = orchestrator
        .analyze_text("I love sunny days. This is the worst thing ever!")
        .await
        .unwrap();

    assert_eq!(classifier.call_count(), 2);
    assert_eq!(
        classifier.inputs(),
        vec![
            "<1>I love sunny days.<1>".to_string(),
            "<2>This is the worst thing ever!<2>".to_string(),
        ]
    );

    assert_eq!(report.sentences.len(), 2);
    assert_eq!(report.sentences[0].line_number, 1);
    assert_eq!(report.sentences[0].sentence, "I love sunny days.");
    assert_eq!(report.sentences[0].result.class_label, ClassLabel::Neither);
    assert_eq!(report.sentences[1].result.class_label, ClassLabel::Offensive);

    assert_eq!(report.summary.concerning_lines, vec![2]);
    assert_eq!(report.summary.count(ClassLabel::Neither), 1);
    assert_eq!(report.summary.count(ClassLabel::Offensive), 1);
}

#[tokio::test]
async fn test_empty_text_makes_no_classifier_call() {
    let classifier = Arc::new(MockClassifier::new("three-way", Taxonomy::ThreeWay));
    let orchestrator = Orchestrator::new(classifier.clone()).unwrap();

    let report = orchestrator.analyze_text("").await.unwrap();
    assert!(report.is_empty());
    assert!(report.summary.label_counts.is_empty());
    assert_eq!(classifier.call_count(), 0);

    let analyses = orchestrator.analyze_segments(&[]).await.unwrap();
    assert!(analyses.is_empty());
    assert_eq!(classifier.call_count(), 0);
}

#[tokio::test]
async fn test_segments_keep_order_and_timestamps() {
    let classifier = Arc::new(
        MockClassifier::new("binary", Taxonomy::Binary).with_latency(Duration::from_millis(2)),
    );
    let orchestrator = Orchestrator::new(classifier.clone()).unwrap();
    let segments = timed_segments();

    let analyses = orchestrator.analyze_segments(&segments).await.unwrap();

    assert_eq!(analyses.len(), segments.len());
    for (analysis, input) in analyses.iter().zip(&segments) {
        assert_eq!(analysis.segment.start, input.start);
        assert_eq!(analysis.segment.end, input.end);
        assert_eq!(analysis.segment.text, input.text);
    }
    assert_eq!(analyses[1].result.class_label, ClassLabel::Abusive);
    assert!(analyses[1].result.is_concerning);
    assert!(!analyses[0].result.is_concerning);
}

#[tokio::test]
async fn test_raw_text_for_unannotated_classifier() {
    let classifier = Arc::new(MockClassifier::new("binary", Taxonomy::Binary));
    let orchestrator = Orchestrator::new(classifier.clone()).unwrap();

    orchestrator.analyze_segments(&timed_segments()).await.unwrap();

    assert_eq!(classifier.inputs()[0], "Good morning everyone.");
}

#[tokio::test]
async fn test_annotated_segments_carry_position_marker() {
    let classifier = Arc::new(
        MockClassifier::new("three-way", Taxonomy::ThreeWay)
            .with_annotation(Annotation::Sequential),
    );
    let orchestrator = Orchestrator::new(classifier.clone()).unwrap();

    let analyses = orchestrator.analyze_segments(&timed_segments()).await.unwrap();

    assert_eq!(classifier.inputs()[2], "<3>See you tomorrow.<3>");
    // the response keeps the caller's text
    assert_eq!(analyses[2].segment.text, "See you tomorrow.");
}

#[tokio::test]
async fn test_failure_aborts_remaining_segments() {
    let classifier = Arc::new(FailingClassifier::on_call(2));
    let orchestrator = Orchestrator::new(classifier.clone()).unwrap();

    let result = orchestrator.analyze_segments(&timed_segments()).await;

    assert!(result.is_err());
    assert_eq!(classifier.call_count(), 2);
}

#[tokio::test]
async fn test_results_respect_taxonomy_invariants() {
    for taxonomy in [Taxonomy::ThreeWay, Taxonomy::Binary] {
        let classifier = Arc::new(MockClassifier::new("any", taxonomy));
        let orchestrator = Orchestrator::new(classifier).unwrap();

        let report = orchestrator
            .analyze_text("I hate this. The worst day! A calm evening.")
            .await
            .unwrap();

        for sentence in &report.sentences {
            let result = &sentence.result;
            assert!((0.0..=1.0).contains(&result.confidence));
            assert_eq!(taxonomy.label(result.class_id), Some(result.class_label));
            assert_eq!(result.is_concerning, taxonomy.is_concerning(result.class_id));
        }
    }
}
