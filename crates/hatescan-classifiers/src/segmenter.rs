//! Sentence segmentation

use hatescan_core::Result;
use regex::Regex;

/// Splits free text into sentences on terminal punctuation
#[derive(Debug, Clone)]
pub struct Segmenter {
    boundary: Regex,
}

impl Segmenter {
    /// Create a new segmenter
    pub fn new() -> Result<Self> {
        Ok(Self {
            boundary: Regex::new(r"[.!?]\s+").map_err(|e| {
                hatescan_core::Error::internal(format!("Failed to compile sentence regex: {}", e))
            })?,
        })
    }

    /// Split text into trimmed, non-empty sentences.
    ///
    /// A sentence ends right after `.`, `!` or `?` when whitespace follows.
    /// There is no abbreviation handling, so "Mr. Smith" splits after "Mr.".
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for m in self.boundary.find_iter(text) {
            // punctuation is ASCII, so the cut lands on a char boundary
            let end = m.start() + 1;
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
        push_trimmed(&mut sentences, &text[start..]);

        sentences
    }
}

fn push_trimmed(sentences: &mut Vec<String>, fragment: &str) {
    let fragment = fragment.trim();
    if !fragment.is_empty() {
        sentences.push(fragment.to_string());
    }
}

/// Split text with a one-off segmenter. Callers splitting many texts keep a
/// [`Segmenter`] instead.
pub fn split_into_sentences(text: &str) -> Result<Vec<String>> {
    Ok(Segmenter::new()?.split(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(text: &str) -> Vec<String> {
        Segmenter::new().unwrap().split(text)
    }

    #[test]
    fn test_two_sentences() {
        assert_eq!(
            split("I love sunny days. This is the worst thing ever!"),
            vec!["I love sunny days.", "This is the worst thing ever!"]
        );
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert!(split("").is_empty());
        assert!(split("   \n\t ").is_empty());
    }

    #[test]
    fn test_punctuation_without_whitespace_does_not_split() {
        assert_eq!(
            split("Version 1.2 is out.Really?"),
            vec!["Version 1.2 is out.Really?"]
        );
    }

    #[test]
    fn test_abbreviation_is_split() {
        assert_eq!(split("Mr. Smith arrived."), vec!["Mr.", "Smith arrived."]);
    }

    #[test]
    fn test_newlines_and_repeated_punctuation() {
        assert_eq!(
            split("What?!  Really.\nYes"),
            vec!["What?!", "Really.", "Yes"]
        );
    }

    #[test]
    fn test_free_function_matches_segmenter() {
        let text = "Mr. Smith left!  Did he?";
        assert_eq!(split_into_sentences(text).unwrap(), split(text));
        assert_eq!(
            split_into_sentences(text).unwrap(),
            vec!["Mr.", "Smith left!", "Did he?"]
        );
        assert!(split_into_sentences("   ").unwrap().is_empty());
    }
}
