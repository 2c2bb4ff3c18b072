//! Sentence-by-sentence hate-speech classification from the terminal

use clap::Parser;
use hatescan_classifiers::config::DEFAULT_THREE_WAY_DIR;
use hatescan_classifiers::{LocalModelSettings, SentenceReport};
use hatescan_core::hub::has_model_files;
use std::ffi::OsString;
use std::fmt::Write as _;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "hatescan-classify")]
#[command(about = "Classify each sentence of a text as HATE_SPEECH, OFFENSIVE or NEITHER")]
pub struct Cli {
    /// Text to classify; read from stdin when omitted
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub text: Vec<String>,

    /// Trained model directory, taken from the environment only
    #[arg(skip = model_dir_from(std::env::var_os(MODEL_DIR_ENV)))]
    pub model_dir: PathBuf,
}

/// Environment variable naming the trained model directory
pub const MODEL_DIR_ENV: &str = "HATESCAN_MODEL_DIR";

fn model_dir_from(value: Option<OsString>) -> PathBuf {
    value
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_THREE_WAY_DIR))
}

/// Positional words joined by spaces, or everything on `input` until EOF
pub fn read_text(words: &[String], mut input: impl Read) -> io::Result<String> {
    if !words.is_empty() {
        return Ok(words.join(" "));
    }

    let mut text = String::new();
    input.read_to_string(&mut text)?;
    Ok(text)
}

/// Settings for the trained model in `dir`. When none is there, ask whether
/// to fall back to the untrained base model; `None` means the user declined.
pub fn choose_model(
    dir: &Path,
    input: impl BufRead,
    mut output: impl Write,
) -> io::Result<Option<LocalModelSettings>> {
    if has_model_files(dir) {
        writeln!(output, "Loading model from {}...", dir.display())?;
        return Ok(Some(LocalModelSettings::local(dir)));
    }

    writeln!(output, "Model not found at {}", dir.display())?;
    writeln!(output)?;
    writeln!(
        output,
        "Train a three-way DistilBERT classifier and save it there, or set HATESCAN_MODEL_DIR."
    )?;
    writeln!(
        output,
        "For quick testing the untrained base DistilBERT can be used instead (type 'yes'):"
    )?;
    output.flush()?;

    if confirmed(input)? {
        writeln!(
            output,
            "Using base DistilBERT for demonstration (not trained on hate speech)"
        )?;
        Ok(Some(LocalModelSettings::base_three_way()))
    } else {
        Ok(None)
    }
}

fn confirmed(mut input: impl BufRead) -> io::Result<bool> {
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

/// Per-line results followed by the summary
pub fn render_report(report: &SentenceReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);

    // writing to a String cannot fail
    let _ = writeln!(out, "{rule}\nCLASSIFICATION RESULTS\n{rule}");
    if report.is_empty() {
        let _ = writeln!(out, "No sentences found in the text.");
    } else {
        let _ = writeln!(out, "\nProcessing {} sentence(s)...\n", report.sentences.len());
    }

    for line in &report.sentences {
        let _ = writeln!(
            out,
            "Line {}: [{}] (confidence: {:.3})",
            line.line_number, line.result.class_label, line.result.confidence
        );
        let _ = writeln!(out, "  Text: {}\n", line.sentence);
    }

    let _ = writeln!(out, "{rule}\nSUMMARY\n{rule}");
    for (label, count) in &report.summary.label_counts {
        let _ = writeln!(out, "{label}: {count} sentence(s)");
    }

    let concerning = &report.summary.concerning_lines;
    if concerning.is_empty() {
        let _ = writeln!(out, "\nNo concerning content detected");
    } else {
        let _ = writeln!(out, "\nFound {} concerning sentence(s)", concerning.len());
        for line in report
            .sentences
            .iter()
            .filter(|s| concerning.contains(&s.line_number))
        {
            let _ = writeln!(out, "  - Line {}: {}", line.line_number, line.result.class_label);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_words_win_over_stdin() {
        let words = vec!["I".to_string(), "agree.".to_string()];
        let text = read_text(&words, "ignored".as_bytes()).unwrap();
        assert_eq!(text, "I agree.");

        let text = read_text(&[], "line one.\nline two.".as_bytes()).unwrap();
        assert_eq!(text, "line one.\nline two.");
    }

    #[test]
    fn test_arguments_are_only_text() {
        let cli = Cli::try_parse_from(["hatescan-classify", "You", "are", "fine."]).unwrap();
        assert_eq!(cli.text, vec!["You", "are", "fine."]);
    }

    #[test]
    fn test_model_dir_from_environment_value() {
        assert_eq!(model_dir_from(None), PathBuf::from(DEFAULT_THREE_WAY_DIR));
        assert_eq!(
            model_dir_from(Some(OsString::new())),
            PathBuf::from(DEFAULT_THREE_WAY_DIR)
        );
        assert_eq!(
            model_dir_from(Some(OsString::from("/models/three_way"))),
            PathBuf::from("/models/three_way")
        );
    }

    #[test]
    fn test_existing_model_dir_is_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();

        let mut output = Vec::new();
        let settings = choose_model(dir.path(), "".as_bytes(), &mut output)
            .unwrap()
            .unwrap();

        assert_eq!(settings.path, dir.path());
        assert!(settings.hub_repo.is_none());
    }

    #[test]
    fn test_missing_model_requires_yes() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("hate_speech_model");

        let mut output = Vec::new();
        let settings = choose_model(&missing, "YES\n".as_bytes(), &mut output)
            .unwrap()
            .unwrap();
        assert_eq!(settings.hub_repo.as_deref(), Some("distilbert-base-uncased"));
        assert!(String::from_utf8(output).unwrap().contains("Model not found"));

        for answer in ["no\n", "y\n", ""] {
            let declined = choose_model(&missing, answer.as_bytes(), Vec::new()).unwrap();
            assert!(declined.is_none(), "answer {answer:?} must decline");
        }
    }
}
