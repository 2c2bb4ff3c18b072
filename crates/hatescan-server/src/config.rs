//! Service configuration: YAML file plus command-line and environment overrides

use clap::Parser;
use hatescan_classifiers::{ClassifierKind, ClassifierSettings};
use hatescan_transcription::WhisperSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "hatescan-server")]
#[command(about = "Hate-speech classification and transcription service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HATESCAN_CONFIG", default_value = "hatescan.yaml")]
    pub config: String,

    /// Classifier adapter: distilbert, bert-rationale or remote-prompt
    #[arg(long, env = "HATESCAN_CLASSIFIER")]
    pub classifier: Option<ClassifierKind>,

    /// Model directory of the selected local classifier
    #[arg(long, env = "HATESCAN_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Device of the selected local classifier
    #[arg(long, env = "HATESCAN_DEVICE")]
    pub device: Option<String>,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Ollama model tag
    #[arg(long, env = "OLLAMA_MODEL")]
    pub ollama_model: Option<String>,

    /// Whisper model size or Hub repository
    #[arg(long, env = "WHISPER_MODEL_SIZE")]
    pub whisper_model_size: Option<String>,

    #[arg(long, env = "WHISPER_DEVICE")]
    pub whisper_device: Option<String>,

    /// float32, float16, bfloat16 or int8
    #[arg(long, env = "WHISPER_COMPUTE_TYPE")]
    pub whisper_compute_type: Option<String>,

    /// Enable the transcription endpoints
    #[arg(long, env = "HATESCAN_TRANSCRIPTION")]
    pub transcription: Option<bool>,

    /// Listen address
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Listen port
    #[arg(short = 'P', long, default_value = "8001")]
    pub port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub classifiers: ClassifierSettings,

    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

impl ServiceConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(&cli.config).exists() {
            let content = std::fs::read_to_string(&cli.config)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_overrides(cli);
        Ok(config)
    }

    /// Apply command-line and environment overrides
    pub fn apply_overrides(&mut self, cli: &Cli) {
        let classifiers = &mut self.classifiers;

        if let Some(kind) = cli.classifier {
            classifiers.kind = kind;
        }

        if let Some(local) = classifiers.selected_local_mut() {
            if let Some(dir) = &cli.model_dir {
                local.path = dir.clone();
            }
            if let Some(device) = &cli.device {
                local.device = device.clone();
            }
        }

        if let Some(url) = &cli.ollama_url {
            classifiers.remote.endpoint = url.clone();
        }
        if let Some(model) = &cli.ollama_model {
            classifiers.remote.model = model.clone();
        }

        let transcription = &mut self.transcription;
        if let Some(enabled) = cli.transcription {
            transcription.enabled = enabled;
        }
        if let Some(size) = &cli.whisper_model_size {
            transcription.whisper.model_size = size.clone();
        }
        if let Some(device) = &cli.whisper_device {
            transcription.whisper.device = device.clone();
        }
        if let Some(compute_type) = &cli.whisper_compute_type {
            transcription.whisper.compute_type = compute_type.clone();
        }
    }
}

/// Transcription endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub whisper: WhisperSettings,

    /// Directory uploads are staged in while they are transcribed
    #[serde(default = "default_upload_dir")]
    pub temp_upload_dir: PathBuf,

    /// Request body limit for uploads
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            whisper: WhisperSettings::default(),
            temp_upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("temp_uploads")
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}
