//! Shared service context

use crate::config::ServiceConfig;
use hatescan_classifiers::{build_classifier, Classifier, Orchestrator};
use hatescan_core::Result;
use hatescan_transcription::Transcriber;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServiceConfig>,

    /// Runs the selected classifier over request segments
    pub orchestrator: Arc<Orchestrator>,

    /// Absent when transcription is disabled
    pub transcriber: Option<Arc<Transcriber>>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: PrometheusHandle,
}

impl AppState {
    /// Build the classifier and transcriber named by `config`. Nothing is
    /// loaded yet.
    pub fn new(config: ServiceConfig, metrics_handle: PrometheusHandle) -> Result<Self> {
        let classifier = build_classifier(&config.classifiers)?;

        let transcriber = if config.transcription.enabled {
            Some(Arc::new(Transcriber::whisper(
                config.transcription.whisper.clone(),
            )))
        } else {
            info!("Transcription disabled");
            None
        };

        Self::from_parts(config, classifier, transcriber, metrics_handle)
    }

    /// Assemble state from already constructed components
    pub fn from_parts(
        config: ServiceConfig,
        classifier: Arc<dyn Classifier>,
        transcriber: Option<Arc<Transcriber>>,
        metrics_handle: PrometheusHandle,
    ) -> Result<Self> {
        if transcriber.is_some() {
            std::fs::create_dir_all(&config.transcription.temp_upload_dir)?;
        }

        Ok(Self {
            config: Arc::new(config),
            orchestrator: Arc::new(Orchestrator::new(classifier)?),
            transcriber,
            metrics_handle,
        })
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        self.orchestrator.classifier()
    }

    /// Load every model up front so the first request does not pay for it
    pub async fn load_models(&self) -> Result<()> {
        let classifier = self.classifier();
        info!("Loading classifier '{}'", classifier.name());
        classifier.load().await?;

        if let Some(transcriber) = &self.transcriber {
            info!(
                "Loading Whisper model '{}'",
                self.config.transcription.whisper.repo_id()
            );
            transcriber.load().await?;
        }

        Ok(())
    }

    /// Release every model
    pub async fn unload_models(&self) {
        self.classifier().unload().await;
        if let Some(transcriber) = &self.transcriber {
            transcriber.unload().await;
        }
        info!("Models unloaded");
    }
}
