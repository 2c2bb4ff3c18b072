//! HTTP routes and handlers

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::error::AppError;
use crate::state::AppState;
use hatescan_core::{ClassLabel, Error, SegmentAnalysis, Taxonomy, TextSegment, Transcription};
use hatescan_transcription::TranscribeOptions;

pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.config.transcription.max_upload_bytes;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/analyze", post(analyze))
        .route("/transcription/upload", post(upload))
        .route("/transcription/health", get(transcription_health))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "hatescan",
        "status": "running",
        "available_endpoints": [
            "/health",
            "/analyze",
            "/transcription/upload",
            "/transcription/health",
            "/metrics",
        ],
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let classifier = state.classifier();
    let classes: Vec<&str> = classifier
        .taxonomy()
        .labels()
        .iter()
        .map(ClassLabel::as_str)
        .collect();

    Json(json!({
        "status": "healthy",
        "model": classifier.name(),
        "classes": classes,
        "state": classifier.state(),
    }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub segments: Vec<TextSegment>,
}

/// Per-taxonomy name of the concerning flag
#[derive(Debug, Serialize)]
enum ConcernFlag {
    #[serde(rename = "isExtremist")]
    Extremist(bool),
    #[serde(rename = "is_abusive")]
    Abusive(bool),
}

#[derive(Debug, Serialize)]
pub struct SegmentVerdict {
    start: Option<f64>,
    end: Option<f64>,
    text: String,
    #[serde(flatten)]
    flag: ConcernFlag,
    class_type: ClassLabel,
    confidence: f32,
    degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<String>,
}

impl SegmentVerdict {
    fn new(analysis: SegmentAnalysis, taxonomy: Taxonomy) -> Self {
        let SegmentAnalysis { segment, result } = analysis;
        let flag = match taxonomy {
            Taxonomy::ThreeWay => ConcernFlag::Extremist(result.is_concerning),
            Taxonomy::Binary => ConcernFlag::Abusive(result.is_concerning),
        };

        Self {
            start: segment.start,
            end: segment.end,
            text: segment.text,
            flag,
            class_type: result.class_label,
            confidence: result.confidence,
            degraded: result.is_degraded(),
            reasoning: result.reasoning,
        }
    }
}

/// Classify each segment in order
async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<Vec<SegmentVerdict>>, AppError> {
    metrics::counter!("hatescan_requests_total", "endpoint" => "analyze").increment(1);
    info!("Analyzing {} segments", req.segments.len());

    let analyses = state.orchestrator.analyze_segments(&req.segments).await?;
    let taxonomy = state.classifier().taxonomy();

    let verdicts = analyses
        .into_iter()
        .map(|analysis| {
            let result = &analysis.result;
            metrics::counter!("hatescan_segments_total", "label" => result.class_label.as_str())
                .increment(1);
            metrics::histogram!("hatescan_classify_latency_us").record(result.latency_us as f64);
            if result.is_degraded() {
                metrics::counter!("hatescan_degraded_total").increment(1);
            }
            SegmentVerdict::new(analysis, taxonomy)
        })
        .collect();

    Ok(Json(verdicts))
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    #[serde(default = "default_beam_size")]
    pub beam_size: usize,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default = "default_word_timestamps")]
    pub word_timestamps: bool,
}

fn default_beam_size() -> usize {
    5
}

fn default_word_timestamps() -> bool {
    true
}

impl UploadParams {
    fn options(self) -> TranscribeOptions {
        TranscribeOptions {
            beam_size: self.beam_size,
            language: self.language.filter(|l| !l.trim().is_empty()),
            word_timestamps: self.word_timestamps,
        }
    }
}

/// Transcribe an uploaded audio file
async fn upload(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> Result<Json<Transcription>, AppError> {
    metrics::counter!("hatescan_requests_total", "endpoint" => "transcription").increment(1);

    let transcriber = state
        .transcriber
        .clone()
        .ok_or(AppError::TranscriptionDisabled)?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("audio/") {
            return Err(Error::validation(format!(
                "Invalid file type '{}'. Please upload an audio file.",
                content_type
            ))
            .into());
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await?;
        debug!(file = %file_name, bytes = bytes.len(), "Received upload");

        // removed when `staged` drops
        let staged = stage_upload(&state.config.transcription.temp_upload_dir, &file_name)?;
        tokio::fs::write(staged.path(), &bytes)
            .await
            .map_err(Error::from)?;

        let transcription = transcriber
            .transcribe(staged.path(), &params.options())
            .await?;

        info!(
            file = %file_name,
            language = %transcription.language,
            segments = transcription.segments.len(),
            "Transcribed upload"
        );
        return Ok(Json(transcription));
    }

    Err(Error::validation("multipart body has no 'file' field").into())
}

/// Temporary file in `dir` keeping the upload's extension as a format hint
fn stage_upload(dir: &Path, file_name: &str) -> Result<tempfile::NamedTempFile, Error> {
    let suffix = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    Ok(tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(dir)?)
}

async fn transcription_health(State(state): State<AppState>) -> Json<Value> {
    let ready = state
        .transcriber
        .as_ref()
        .map(|t| t.state() == hatescan_core::ModelState::Ready)
        .unwrap_or(false);

    Json(json!({
        "status": if ready { "ready" } else { "not_initialized" },
        "service": "whisper",
    }))
}

async fn fallback() -> AppError {
    AppError::Service(Error::not_found("route"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_params_defaults() {
        let params: UploadParams = serde_json::from_value(json!({})).unwrap();
        let options = params.options();
        assert_eq!(options.beam_size, 5);
        assert!(options.word_timestamps);
        assert!(options.language.is_none());

        let params: UploadParams = serde_json::from_value(json!({ "language": " " })).unwrap();
        assert!(params.options().language.is_none());
    }

    #[test]
    fn test_stage_upload_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage_upload(dir.path(), "interview.MP3").unwrap();
        assert!(staged.path().to_string_lossy().ends_with(".MP3"));
        assert!(staged.path().starts_with(dir.path()));

        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
    }
}
