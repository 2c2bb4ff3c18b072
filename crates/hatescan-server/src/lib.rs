//! hatescan HTTP service
//!
//! Classifies transcript segments with the configured hate-speech classifier
//! and transcribes uploaded audio with Whisper.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{Cli, ServiceConfig, TranscriptionConfig};
pub use error::AppError;
pub use routes::create_router;
pub use state::AppState;
