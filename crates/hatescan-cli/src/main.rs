//! hatescan-classify
//!
//! Splits text into sentences and prints a three-way hate-speech label for
//! each one.

use clap::Parser;
use hatescan_classifiers::{Classifier, DistilBertClassifier, Orchestrator};
use hatescan_cli::{choose_model, read_text, render_report, Cli};
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let stdin = io::stdin();
    let Some(settings) = choose_model(&cli.model_dir, stdin.lock(), io::stdout())? else {
        return Ok(ExitCode::FAILURE);
    };

    let classifier = Arc::new(DistilBertClassifier::new(settings));
    classifier.load().await?;
    println!("Model loaded successfully!");

    if cli.text.is_empty() {
        println!("Enter text (press Ctrl+D when done):");
        println!("{}", "-".repeat(60));
    }
    let text = read_text(&cli.text, stdin.lock())?;
    if text.trim().is_empty() {
        println!("No text provided!");
        return Ok(ExitCode::SUCCESS);
    }

    let orchestrator = Orchestrator::new(classifier.clone())?;
    let report = orchestrator.analyze_text(&text).await?;
    println!();
    print!("{}", render_report(&report));

    classifier.unload().await;
    Ok(ExitCode::SUCCESS)
}

/// Logs go to stderr so they never mix with the report
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hatescan=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
