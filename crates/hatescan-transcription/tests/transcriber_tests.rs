//! Transcriber behaviour against scripted speech engines

use hatescan_core::{Error, ModelState, Result, TranscriptionSegment, WordTimestamp};
use hatescan_transcription::{
    DecodeInfo, SegmentStream, SpeechEngine, TranscribeOptions, Transcriber,
};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Engine returning fixed segments, failing at `fail_at` when set
struct ScriptedEngine {
    segments: Vec<TranscriptionSegment>,
    fail_at: Option<usize>,
    calls: Arc<AtomicU32>,
    seen_options: Arc<Mutex<Vec<TranscribeOptions>>>,
}

impl SpeechEngine for ScriptedEngine {
    fn transcribe(&self, _path: &Path, options: &TranscribeOptions) -> Result<(DecodeInfo, SegmentStream)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_options.lock().unwrap().push(options.clone());

        let fail_at = self.fail_at;
        let items = self.segments.clone().into_iter().enumerate().map(move |(i, s)| {
            if Some(i) == fail_at {
                Err(Error::transcription("decoder blew up"))
            } else {
                Ok(s)
            }
        });

        Ok((
            DecodeInfo {
                language: options.language.clone().unwrap_or_else(|| "en".to_string()),
                language_probability: 0.98,
                duration: 4.0,
            },
            Box::new(items.collect::<Vec<_>>().into_iter()),
        ))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn segments() -> Vec<TranscriptionSegment> {
    vec![
        TranscriptionSegment {
            start: 0.0,
            end: 2.0,
            text: "Hello there.".to_string(),
            words: Some(vec![
                WordTimestamp {
                    start: 0.0,
                    end: 1.0,
                    word: " Hello".to_string(),
                },
                WordTimestamp {
                    start: 1.0,
                    end: 2.0,
                    word: " there.".to_string(),
                },
            ]),
        },
        TranscriptionSegment {
            start: 2.0,
            end: 4.0,
            text: "General Kenobi.".to_string(),
            words: None,
        },
    ]
}

struct Harness {
    transcriber: Transcriber,
    loads: Arc<AtomicU32>,
    calls: Arc<AtomicU32>,
    seen_options: Arc<Mutex<Vec<TranscribeOptions>>>,
}

fn harness(fail_at: Option<usize>) -> Harness {
    let loads = Arc::new(AtomicU32::new(0));
    let calls = Arc::new(AtomicU32::new(0));
    let seen_options = Arc::new(Mutex::new(Vec::new()));

    let (l, c, s) = (loads.clone(), calls.clone(), seen_options.clone());
    let transcriber = Transcriber::with_loader(move || {
        l.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            segments: segments(),
            fail_at,
            calls: c.clone(),
            seen_options: s.clone(),
        }) as Box<dyn SpeechEngine>)
    });

    Harness {
        transcriber,
        loads,
        calls,
        seen_options,
    }
}

fn audio_file() -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
    std::fs::write(file.path(), b"RIFF").unwrap();
    file
}

#[tokio::test]
async fn test_missing_file_fails_before_loading() {
    let h = harness(None);

    let err = h
        .transcriber
        .transcribe(Path::new("/nonexistent/recording.wav"), &TranscribeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(h.loads.load(Ordering::SeqCst), 0);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.transcriber.state(), ModelState::Unloaded);
}

#[tokio::test]
async fn test_transcription_collects_segments_in_order() {
    let h = harness(None);
    let file = audio_file();

    let transcription = h
        .transcriber
        .transcribe(file.path(), &TranscribeOptions::default())
        .await
        .unwrap();

    assert_eq!(transcription.language, "en");
    assert!((transcription.language_probability - 0.98).abs() < 1e-9);
    assert_eq!(transcription.duration, 4.0);
    assert_eq!(transcription.segments, segments());
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.transcriber.state(), ModelState::Ready);
}

#[tokio::test]
async fn test_options_reach_the_engine() {
    let h = harness(None);
    let file = audio_file();
    let options = TranscribeOptions {
        beam_size: 1,
        language: Some("de".to_string()),
        word_timestamps: true,
    };

    let transcription = h.transcriber.transcribe(file.path(), &options).await.unwrap();

    assert_eq!(transcription.language, "de");
    assert_eq!(h.seen_options.lock().unwrap().as_slice(), &[options]);
}

#[tokio::test]
async fn test_words_dropped_when_not_requested() {
    let h = harness(None);
    let file = audio_file();
    let options = TranscribeOptions {
        word_timestamps: false,
        ..Default::default()
    };

    let transcription = h.transcriber.transcribe(file.path(), &options).await.unwrap();

    assert!(transcription.segments.iter().all(|s| s.words.is_none()));
    assert_eq!(transcription.segments[0].text, "Hello there.");
}

#[tokio::test]
async fn test_segment_failure_fails_the_file() {
    let h = harness(Some(1));
    let file = audio_file();

    let err = h
        .transcriber
        .transcribe(file.path(), &TranscribeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transcription(_)));
}

#[tokio::test]
async fn test_engine_loads_once_and_reloads_after_unload() {
    let h = harness(None);
    let file = audio_file();

    h.transcriber.load().await.unwrap();
    h.transcriber.load().await.unwrap();
    h.transcriber
        .transcribe(file.path(), &TranscribeOptions::default())
        .await
        .unwrap();
    assert_eq!(h.loads.load(Ordering::SeqCst), 1);

    h.transcriber.unload().await;
    assert_eq!(h.transcriber.state(), ModelState::Unloaded);

    h.transcriber
        .transcribe(file.path(), &TranscribeOptions::default())
        .await
        .unwrap();
    assert_eq!(h.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_load_stays_unloaded() {
    let transcriber =
        Transcriber::with_loader(|| Err(Error::not_found("whisper checkpoint")));
    let file = audio_file();

    let err = transcriber
        .transcribe(file.path(), &TranscribeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(transcriber.state(), ModelState::Unloaded);
}
