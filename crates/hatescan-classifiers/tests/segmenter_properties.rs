//! Property tests for sentence segmentation

use hatescan_classifiers::{annotate, split_into_sentences, Segmenter};
use proptest::prelude::*;

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

proptest! {
    #[test]
    fn sentences_are_trimmed_and_non_empty(text in "[a-zA-Z .!?\n\t]{0,200}") {
        for sentence in split_into_sentences(&text).unwrap() {
            prop_assert!(!sentence.is_empty());
            prop_assert_eq!(sentence.trim(), sentence.as_str());
        }
    }

    #[test]
    fn sentences_reconstruct_the_input(text in "[a-zA-Z0-9 ,.!?\n]{0,200}") {
        let segmenter = Segmenter::new().unwrap();
        let joined: String = segmenter.split(&text).concat();
        prop_assert_eq!(strip_whitespace(&joined), strip_whitespace(&text));
    }

    #[test]
    fn inner_sentences_end_with_punctuation(text in "[a-z ]{1,20}([.!?] [a-z ]{1,20}){0,5}") {
        let segmenter = Segmenter::new().unwrap();
        let sentences = segmenter.split(&text);
        if let Some((_, inner)) = sentences.split_last() {
            for sentence in inner {
                prop_assert!(sentence.ends_with(['.', '!', '?']));
            }
        }
    }

    #[test]
    fn annotation_preserves_count_and_order(sentences in prop::collection::vec("[a-z]{1,10}", 0..20)) {
        let annotated = annotate(&sentences);
        prop_assert_eq!(annotated.len(), sentences.len());
        for (i, a) in annotated.iter().enumerate() {
            prop_assert_eq!(a.index, i + 1);
            prop_assert_eq!(&a.sentence, &sentences[i]);
            prop_assert_eq!(a.text.clone(), format!("<{}>{}<{}>", i + 1, sentences[i], i + 1));
        }
    }
}
