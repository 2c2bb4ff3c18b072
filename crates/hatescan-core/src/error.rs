//! Error types for hatescan

/// Result type alias using hatescan's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hatescan operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing model directory or audio file
    #[error("not found: {0}")]
    NotFound(String),

    /// Remote classifier unreachable, timed out or answered with an error status
    #[error("transport error: {0}")]
    Transport(String),

    /// Reply from a remote model could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// Request rejected before any model work
    #[error("validation error: {0}")]
    Validation(String),

    /// Classifier execution errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Audio decoding or speech recognition errors
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new transcription error
    pub fn transcription(msg: impl Into<String>) -> Self {
        Self::Transcription(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short machine-readable name of the error kind, used for metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Transport(_) => "transport",
            Self::Parse(_) => "parse",
            Self::Validation(_) => "validation",
            Self::Classifier(_) => "classifier",
            Self::Transcription(_) => "transcription",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}
