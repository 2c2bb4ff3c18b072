//! Speech model settings

use serde::{Deserialize, Serialize};

/// Which Whisper checkpoint to run and how
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperSettings {
    /// `tiny`, `base`, `small`, `medium`, `large-v3`, a `.en` variant,
    /// or a full Hub repository id
    #[serde(default = "default_model_size")]
    pub model_size: String,

    /// `cpu`, `cuda` or `metal`
    #[serde(default = "default_device")]
    pub device: String,

    /// `float32`, `float16`, `bfloat16` or `int8`
    #[serde(default = "default_compute_type")]
    pub compute_type: String,
}

fn default_model_size() -> String {
    "base".to_string()
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_compute_type() -> String {
    "int8".to_string()
}

impl Default for WhisperSettings {
    fn default() -> Self {
        Self {
            model_size: default_model_size(),
            device: default_device(),
            compute_type: default_compute_type(),
        }
    }
}

impl WhisperSettings {
    /// Hub repository holding the checkpoint
    pub fn repo_id(&self) -> String {
        if self.model_size.contains('/') {
            self.model_size.clone()
        } else {
            format!("openai/whisper-{}", self.model_size)
        }
    }

    /// English-only checkpoints carry no language tokens
    pub fn is_english_only(&self) -> bool {
        self.model_size.ends_with(".en")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id() {
        let mut settings = WhisperSettings::default();
        assert_eq!(settings.repo_id(), "openai/whisper-base");
        assert!(!settings.is_english_only());

        settings.model_size = "small.en".to_string();
        assert_eq!(settings.repo_id(), "openai/whisper-small.en");
        assert!(settings.is_english_only());

        settings.model_size = "distil-whisper/distil-large-v3".to_string();
        assert_eq!(settings.repo_id(), "distil-whisper/distil-large-v3");
    }
}
