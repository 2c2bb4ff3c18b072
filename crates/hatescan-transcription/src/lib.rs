//! # hatescan transcription
//!
//! Speech-to-text for the hatescan service. Audio files are decoded with
//! symphonia, resampled to 16 kHz mono and transcribed by a Whisper model
//! running on candle. The [`Transcriber`] owns the model lifecycle and runs
//! decoding on the blocking pool; [`SpeechEngine`] is the seam tests mock.

pub mod audio;
pub mod config;
pub mod engine;
pub mod languages;
pub mod transcriber;
pub mod whisper;

pub use config::WhisperSettings;
pub use engine::{DecodeInfo, DecodeOptions, SegmentStream, SpeechEngine};
pub use transcriber::{TranscribeOptions, Transcriber};
pub use whisper::WhisperEngine;
