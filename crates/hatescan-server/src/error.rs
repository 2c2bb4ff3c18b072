//! HTTP error mapping

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hatescan_core::Error;
use serde_json::json;
use tracing::error;

/// Error returned by handlers
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Service(#[from] Error),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("transcription is disabled")]
    TranscriptionDisabled,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Service(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Service(Error::Transport(_)) => StatusCode::BAD_GATEWAY,
            Self::Service(Error::Validation(_)) | Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TranscriptionDisabled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Service(e) => e.kind(),
            Self::Multipart(_) => "validation",
            Self::TranscriptionDisabled => "unavailable",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        metrics::counter!("hatescan_errors_total", "kind" => kind).increment(1);
        error!(status = status.as_u16(), kind, "Request failed: {}", self);

        let body = json!({
            "error": {
                "message": self.to_string(),
                "type": kind,
            }
        });

        (status, Json(body)).into_response()
    }
}
