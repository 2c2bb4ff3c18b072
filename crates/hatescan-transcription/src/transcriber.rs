//! Transcription service: lifecycle plus blocking-pool decoding

use crate::config::WhisperSettings;
use crate::engine::{DecodeOptions, SpeechEngine};
use crate::whisper::WhisperEngine;
use hatescan_core::{Error, ModelSlot, ModelState, Result, Transcription};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Per-request decoding options
pub type TranscribeOptions = DecodeOptions;

type EngineLoader = Arc<dyn Fn() -> Result<Box<dyn SpeechEngine>> + Send + Sync>;

/// Lazily loaded speech engine
pub struct Transcriber {
    loader: EngineLoader,
    slot: ModelSlot<Box<dyn SpeechEngine>>,
}

impl Transcriber {
    /// Transcriber backed by a Whisper checkpoint
    pub fn whisper(settings: WhisperSettings) -> Self {
        Self::with_loader(move || {
            let engine = WhisperEngine::load(&settings)?;
            Ok(Box::new(engine) as Box<dyn SpeechEngine>)
        })
    }

    /// Transcriber backed by any engine constructor
    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn SpeechEngine>> + Send + Sync + 'static,
    {
        Self {
            loader: Arc::new(loader),
            slot: ModelSlot::new(),
        }
    }

    /// Load the engine if it is not loaded yet
    pub async fn load(&self) -> Result<()> {
        self.engine().await.map(|_| ())
    }

    /// Release the engine
    pub async fn unload(&self) {
        if self.slot.unload().await {
            tracing::info!("Transcription engine unloaded");
        }
    }

    pub fn state(&self) -> ModelState {
        self.slot.state()
    }

    async fn engine(&self) -> Result<Arc<Box<dyn SpeechEngine>>> {
        let loader = Arc::clone(&self.loader);
        self.slot
            .get_or_load(|| async move {
                let start = Instant::now();
                let engine = tokio::task::spawn_blocking(move || loader())
                    .await
                    .map_err(|e| Error::internal(format!("engine load task failed: {}", e)))??;
                tracing::info!(
                    engine = engine.name(),
                    load_ms = start.elapsed().as_millis() as u64,
                    "Transcription engine ready"
                );
                Ok(engine)
            })
            .await
    }

    /// Transcribe one audio file.
    ///
    /// Fails with `Error::NotFound` before any model work when `path` does
    /// not exist. A failure in any segment fails the whole file.
    pub async fn transcribe(&self, path: &Path, options: &TranscribeOptions) -> Result<Transcription> {
        if !path.exists() {
            return Err(Error::not_found(format!("audio file {}", path.display())));
        }

        let engine = self.engine().await?;
        let path = path.to_path_buf();
        let options = options.clone();

        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let (info, stream) = engine.transcribe(&path, &options)?;

            let mut segments = stream.collect::<Result<Vec<_>>>()?;
            if !options.word_timestamps {
                for segment in &mut segments {
                    segment.words = None;
                }
            }

            tracing::info!(
                language = %info.language,
                duration_secs = info.duration,
                segments = segments.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Transcription complete"
            );

            Ok(Transcription {
                language: info.language,
                language_probability: info.language_probability,
                duration: info.duration,
                segments,
            })
        })
        .await
        .map_err(|e| Error::internal(format!("transcription task failed: {}", e)))?
    }
}
