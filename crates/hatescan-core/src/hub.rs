//! Model directory resolution and Hugging Face Hub downloads
//!
//! A model lives in a local directory holding `config.json`, the weights
//! and the tokenizer files. When the directory is missing and a Hub
//! repository is configured, the files are downloaded into the hf-hub cache
//! and optionally written back to the local directory so later starts load
//! from disk.

use crate::error::{Error, Result};
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Weight files, in order of preference
pub const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

/// Tokenizer files, in order of preference
pub const TOKENIZER_FILES: [&str; 2] = ["tokenizer.json", "vocab.txt"];

const OPTIONAL_FILES: [&str; 2] = ["tokenizer_config.json", "special_tokens_map.json"];

/// Where a model is read from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelLocation {
    /// Local model directory
    pub path: PathBuf,

    /// Hub repository to download from when `path` holds no model
    #[serde(default)]
    pub hub_repo: Option<String>,

    /// Hub revision
    #[serde(default = "default_revision")]
    pub revision: String,

    /// Copy a Hub download into `path`
    #[serde(default)]
    pub persist: bool,
}

fn default_revision() -> String {
    "main".to_string()
}

impl ModelLocation {
    /// A model that must already exist on disk
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            hub_repo: None,
            revision: default_revision(),
            persist: false,
        }
    }

    /// Download from `repo` at `revision` when the local directory is empty
    pub fn with_hub_repo(mut self, repo: impl Into<String>, revision: impl Into<String>) -> Self {
        self.hub_repo = Some(repo.into());
        self.revision = revision.into();
        self
    }

    /// Write Hub downloads back into the local directory
    pub fn persisted(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Whether the local directory already holds a model
    pub fn is_available_locally(&self) -> bool {
        has_model_files(&self.path)
    }
}

/// True when `dir` contains `config.json`
pub fn has_model_files(dir: &Path) -> bool {
    !dir.as_os_str().is_empty() && dir.join("config.json").is_file()
}

/// Resolve a model directory, downloading from the Hub when needed.
///
/// Fails with `NotFound` when the directory is missing and no repository
/// is configured.
pub fn resolve_model_dir(location: &ModelLocation) -> Result<PathBuf> {
    if location.is_available_locally() {
        debug!("Using local model directory {}", location.path.display());
        return Ok(location.path.clone());
    }

    let repo_id = location.hub_repo.as_deref().ok_or_else(|| {
        Error::not_found(format!(
            "model not found at {} (no config.json)",
            location.path.display()
        ))
    })?;

    info!(
        "Model not found locally, downloading {} @ {}",
        repo_id, location.revision
    );
    let repo = HubRepo::open(repo_id, &location.revision)?;
    let snapshot_dir = repo.fetch_model_files()?;

    if location.persist && !location.path.as_os_str().is_empty() {
        persist_model_files(&snapshot_dir, &location.path)?;
        info!("Saved model to {} for future loads", location.path.display());
        return Ok(location.path.clone());
    }

    Ok(snapshot_dir)
}

/// Copy the known model files from `from` into `to`
pub fn persist_model_files(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;

    let files = ["config.json"]
        .into_iter()
        .chain(WEIGHT_FILES)
        .chain(TOKENIZER_FILES)
        .chain(OPTIONAL_FILES);

    for file in files {
        let src = from.join(file);
        let dst = to.join(file);
        if src.exists() && !dst.exists() {
            debug!("Copying {}", file);
            std::fs::copy(&src, &dst).map_err(|e| {
                Error::internal(format!("Failed to copy {}: {}", file, e))
            })?;
        }
    }

    Ok(())
}

/// Thin wrapper over a hf-hub repository handle
pub struct HubRepo {
    id: String,
    repo: ApiRepo,
}

impl HubRepo {
    /// Open a model repository at `revision`
    pub fn open(id: &str, revision: &str) -> Result<Self> {
        let api = Api::new().map_err(|e| {
            Error::config(format!("Failed to initialize HuggingFace API: {}", e))
        })?;

        let repo = api.repo(Repo::with_revision(
            id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        Ok(Self {
            id: id.to_string(),
            repo,
        })
    }

    /// Download a single file and return its cache path
    pub fn get(&self, file: &str) -> Result<PathBuf> {
        self.repo.get(file).map_err(|e| {
            Error::not_found(format!("{} not available from {}: {}", file, self.id, e))
        })
    }

    /// Download the first file of `candidates` the repository provides
    pub fn get_first(&self, candidates: &[&str]) -> Result<PathBuf> {
        for file in candidates {
            match self.repo.get(file) {
                Ok(path) => return Ok(path),
                Err(e) => debug!("{} not in {}: {}", file, self.id, e),
            }
        }

        Err(Error::not_found(format!(
            "none of [{}] found in {}",
            candidates.join(", "),
            self.id
        )))
    }

    /// Download config, weights and tokenizer; returns the snapshot directory
    pub fn fetch_model_files(&self) -> Result<PathBuf> {
        let config_path = self.get("config.json")?;
        self.get_first(&WEIGHT_FILES)?;
        self.get_first(&TOKENIZER_FILES)?;

        for file in OPTIONAL_FILES {
            if self.repo.get(file).is_err() {
                debug!("Optional file {} not in {}", file, self.id);
            }
        }

        config_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::internal("Invalid hf-hub cache path"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_directory_is_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();

        let location = ModelLocation::local(dir.path());
        assert!(location.is_available_locally());
        assert_eq!(resolve_model_dir(&location).unwrap(), dir.path());
    }

    #[test]
    fn test_missing_directory_without_repo_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let location = ModelLocation::local(dir.path().join("hate_speech_model"));

        let err = resolve_model_dir(&location).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_builders_set_hub_fields() {
        let location = ModelLocation::local("./hate_speech_model_binary")
            .with_hub_repo("org/model", "v2")
            .persisted(true);

        assert_eq!(location.hub_repo.as_deref(), Some("org/model"));
        assert_eq!(location.revision, "v2");
        assert!(location.persist);
        assert!(!location.is_available_locally());
    }

    #[test]
    fn test_persist_copies_known_files_only() {
        let from = tempfile::tempdir().unwrap();
        let to = tempfile::tempdir().unwrap();
        let target = to.path().join("model");

        std::fs::write(from.path().join("config.json"), "{}").unwrap();
        std::fs::write(from.path().join("vocab.txt"), "[PAD]").unwrap();
        std::fs::write(from.path().join("README.md"), "docs").unwrap();

        persist_model_files(from.path(), &target).unwrap();

        assert!(target.join("config.json").exists());
        assert!(target.join("vocab.txt").exists());
        assert!(!target.join("README.md").exists());
        assert!(has_model_files(&target));
    }
}
