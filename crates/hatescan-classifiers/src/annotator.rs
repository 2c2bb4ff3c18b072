//! Positional sentence markers
//!
//! The three-way model was fine-tuned on text where half the samples carried
//! `<n>sentence<n>` markers with a random `n` in `1..=9999`. At inference the
//! marker is the sentence's 1-based position instead. The two distributions
//! differ and nothing checks that they stay compatible.

use serde::{Deserialize, Serialize};

/// How a classifier expects its input sentences to be decorated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Annotation {
    /// Raw sentence text
    #[default]
    None,
    /// `<i>sentence<i>` with the 1-based sentence index
    Sequential,
}

/// A sentence wrapped with its index marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedSegment {
    /// 1-based position in the input
    pub index: usize,
    /// Undecorated sentence
    pub sentence: String,
    /// Classifier input
    pub text: String,
}

impl Annotation {
    /// Decorate sentence number `index` (1-based)
    pub fn apply(&self, index: usize, sentence: &str) -> String {
        match self {
            Self::None => sentence.to_string(),
            Self::Sequential => mark(index, sentence),
        }
    }
}

fn mark(index: usize, sentence: &str) -> String {
    format!("<{index}>{sentence}<{index}>")
}

/// Wrap every sentence with its sequential marker
pub fn annotate<S: AsRef<str>>(sentences: &[S]) -> Vec<AnnotatedSegment> {
    sentences
        .iter()
        .enumerate()
        .map(|(i, sentence)| {
            let index = i + 1;
            let sentence = sentence.as_ref();
            AnnotatedSegment {
                index,
                sentence: sentence.to_string(),
                text: mark(index, sentence),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_markers() {
        let annotated = annotate(&["First one.", "Second one."]);
        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].text, "<1>First one.<1>");
        assert_eq!(annotated[1].text, "<2>Second one.<2>");
        assert_eq!(annotated[1].sentence, "Second one.");
        assert_eq!(annotated[1].index, 2);
    }

    #[test]
    fn test_policy_apply() {
        assert_eq!(Annotation::None.apply(3, "hello"), "hello");
        assert_eq!(Annotation::Sequential.apply(3, "hello"), "<3>hello<3>");
    }

    #[test]
    fn test_empty_input() {
        let empty: [&str; 0] = [];
        assert!(annotate(&empty).is_empty());
    }
}
