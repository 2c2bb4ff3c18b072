//! Classifier selection and per-variant settings
//!
//! Deserialized from the `classifier:` section of the service YAML file:
//!
//! ```yaml
//! classifier:
//!   kind: bert-rationale
//!   rationale:
//!     path: ./hate_speech_model_binary
//!     device: cpu
//!   remote:
//!     endpoint: http://localhost:11434
//!     model: llama3.2:3b
//! ```

use hatescan_core::{Error, ModelLocation, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default directory of the fine-tuned three-way model
pub const DEFAULT_THREE_WAY_DIR: &str = "./hate_speech_model";

/// Default directory of the binary rationale model
pub const DEFAULT_RATIONALE_DIR: &str = "./hate_speech_model_binary";

/// Hub repository the rationale model is fetched from when missing locally
pub const DEFAULT_RATIONALE_REPO: &str = "Hate-speech-CNERG/bert-base-uncased-hatexplain-rationale-two";

/// Untrained base checkpoint offered when no fine-tuned model exists
pub const BASE_THREE_WAY_REPO: &str = "distilbert-base-uncased";

/// Which classifier adapter the service runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
    /// Fine-tuned DistilBERT, HATE_SPEECH / OFFENSIVE / NEITHER
    #[default]
    Distilbert,
    /// BERT with rationale head, NORMAL / ABUSIVE
    BertRationale,
    /// Generative model behind an Ollama endpoint, NORMAL / ABUSIVE
    RemotePrompt,
}

impl ClassifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distilbert => "distilbert",
            Self::BertRationale => "bert-rationale",
            Self::RemotePrompt => "remote-prompt",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "distilbert" | "three-way" => Ok(Self::Distilbert),
            "bert-rationale" | "rationale" | "binary" => Ok(Self::BertRationale),
            "remote-prompt" | "remote" | "ollama" => Ok(Self::RemotePrompt),
            other => Err(Error::config(format!(
                "unknown classifier '{}' (expected distilbert, bert-rationale or remote-prompt)",
                other
            ))),
        }
    }
}

/// Settings for the whole classifier layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    /// Adapter selected at startup
    #[serde(default)]
    pub kind: ClassifierKind,

    #[serde(default = "LocalModelSettings::three_way")]
    pub distilbert: LocalModelSettings,

    #[serde(default = "LocalModelSettings::rationale")]
    pub rationale: LocalModelSettings,

    #[serde(default)]
    pub remote: RemotePromptSettings,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            kind: ClassifierKind::default(),
            distilbert: LocalModelSettings::three_way(),
            rationale: LocalModelSettings::rationale(),
            remote: RemotePromptSettings::default(),
        }
    }
}

impl ClassifierSettings {
    /// Settings of the local model behind the selected kind, if any
    pub fn selected_local_mut(&mut self) -> Option<&mut LocalModelSettings> {
        match self.kind {
            ClassifierKind::Distilbert => Some(&mut self.distilbert),
            ClassifierKind::BertRationale => Some(&mut self.rationale),
            ClassifierKind::RemotePrompt => None,
        }
    }
}

/// Where a local model lives and what it runs on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelSettings {
    /// Model directory
    pub path: PathBuf,

    /// Hub repository used when `path` holds no model
    #[serde(default)]
    pub hub_repo: Option<String>,

    #[serde(default = "default_revision")]
    pub revision: String,

    /// Write Hub downloads back into `path`
    #[serde(default)]
    pub persist: bool,

    /// `cpu`, `cuda` or `metal`
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

impl LocalModelSettings {
    /// A model that must exist at `path`
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hub_repo: None,
            revision: default_revision(),
            persist: false,
            device: default_device(),
        }
    }

    /// Defaults of the three-way classifier
    pub fn three_way() -> Self {
        Self::local(DEFAULT_THREE_WAY_DIR)
    }

    /// Defaults of the rationale classifier
    pub fn rationale() -> Self {
        Self {
            hub_repo: Some(DEFAULT_RATIONALE_REPO.to_string()),
            persist: true,
            ..Self::local(DEFAULT_RATIONALE_DIR)
        }
    }

    /// Untrained base model read from the Hub cache
    pub fn base_three_way() -> Self {
        Self {
            hub_repo: Some(BASE_THREE_WAY_REPO.to_string()),
            ..Self::local(PathBuf::new())
        }
    }

    pub fn location(&self) -> ModelLocation {
        let location = ModelLocation::local(&self.path).persisted(self.persist);
        match &self.hub_repo {
            Some(repo) => location.with_hub_repo(repo, &self.revision),
            None => location,
        }
    }
}

/// Settings for the Ollama-backed prompt classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePromptSettings {
    /// Base URL of the Ollama server
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model tag to prompt
    #[serde(default = "default_remote_model")]
    pub model: String,

    /// Per-call timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Startup probe timeout
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Generation length cap
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_remote_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_temperature() -> f32 {
    0.1
}

fn default_num_predict() -> u32 {
    150
}

impl Default for RemotePromptSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_remote_model(),
            timeout_secs: default_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            temperature: default_temperature(),
            num_predict: default_num_predict(),
        }
    }
}
