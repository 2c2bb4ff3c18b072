//! Whisper speech engine on candle
//!
//! Audio is cut into 30 second windows of log-mel frames. Each window is
//! decoded with timestamp tokens by beam search, then turned into segments.
//! Word timings are interpolated evenly across the tokens of a segment, so
//! they are approximate.

use crate::audio::{decode_file_to_pcm, duration_secs};
use crate::config::WhisperSettings;
use crate::engine::{DecodeInfo, DecodeOptions, SegmentStream, SpeechEngine};
use crate::languages;
use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hatescan_core::{
    device_from_str, Error, HubRepo, Result, TranscriptionSegment, WordTimestamp,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;

const MEL_FILTERS_REPO: &str = "FL33TW00D-HF/whisper-base";

/// Seconds per timestamp token step
const TIMESTAMP_STEP: f64 = 0.02;

/// Latest allowed first timestamp, in timestamp steps (1 second)
const MAX_INITIAL_TIMESTAMP_INDEX: usize = 50;

fn model_err(context: &'static str) -> impl Fn(candle_core::Error) -> Error {
    move |e| Error::transcription(format!("{}: {}", context, e))
}

/// Map a precision mode to a tensor dtype. Quantized modes have no candle
/// counterpart for this model and run in float32.
pub fn compute_dtype(compute_type: &str) -> DType {
    match compute_type.trim().to_lowercase().as_str() {
        "float32" | "f32" => DType::F32,
        "float16" | "f16" => DType::F16,
        "bfloat16" | "bf16" => DType::BF16,
        other => {
            tracing::warn!(compute_type = other, "Precision mode not supported, using float32");
            DType::F32
        }
    }
}

/// Ids of the control tokens the decoder needs
#[derive(Debug, Clone)]
struct SpecialTokens {
    sot: u32,
    transcribe: u32,
    eot: u32,
    no_timestamps: u32,
    timestamp_begin: u32,
}

impl SpecialTokens {
    fn from_tokenizer(tokenizer: &Tokenizer) -> Result<Self> {
        let no_timestamps = token_id(tokenizer, m::NO_TIMESTAMPS_TOKEN)?;
        Ok(Self {
            sot: token_id(tokenizer, m::SOT_TOKEN)?,
            transcribe: token_id(tokenizer, m::TRANSCRIBE_TOKEN)?,
            eot: token_id(tokenizer, m::EOT_TOKEN)?,
            no_timestamps,
            timestamp_begin: no_timestamps + 1,
        })
    }

    fn is_timestamp(&self, token: u32) -> bool {
        token >= self.timestamp_begin
    }
}

struct LoadedWhisper {
    model: Mutex<m::model::Whisper>,
    tokenizer: Tokenizer,
    config: Config,
    device: Device,
    dtype: DType,
    mel_filters: Vec<f32>,
    special: SpecialTokens,
    language_tokens: Vec<(&'static str, u32)>,
    suppress: Vec<u32>,
    english_only: bool,
}

/// Whisper checkpoint loaded from the Hugging Face Hub
pub struct WhisperEngine {
    name: String,
    inner: Arc<LoadedWhisper>,
}

impl WhisperEngine {
    pub fn load(settings: &WhisperSettings) -> Result<Self> {
        let repo_id = settings.repo_id();
        let device = device_from_str(&settings.device)?;
        let dtype = compute_dtype(&settings.compute_type);

        tracing::info!(
            device = ?device,
            model = %repo_id,
            dtype = ?dtype,
            "Initializing Whisper transcription engine"
        );

        let repo = HubRepo::open(&repo_id, "main")?;
        let config_path = repo.get("config.json")?;
        let tokenizer_path = repo.get("tokenizer.json")?;
        let weights_path = repo.get("model.safetensors")?;

        let config_contents = std::fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_contents)
            .map_err(|e| Error::transcription(format!("parse config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::transcription(format!("tokenizer: {}", e)))?;

        let mel_file = if config.num_mel_bins == 128 {
            "melfilters128.bytes"
        } else {
            "melfilters.bytes"
        };
        let mel_bytes = std::fs::read(HubRepo::open(MEL_FILTERS_REPO, "main")?.get(mel_file)?)?;
        let mel_filters = read_mel_filters(&mel_bytes, &config)?;

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], dtype, &device)
                .map_err(model_err("weights"))?
        };
        let model = m::model::Whisper::load(&vb, config.clone()).map_err(model_err("model"))?;

        let inner = LoadedWhisper::new(
            model,
            tokenizer,
            config,
            device,
            dtype,
            mel_filters,
            settings.is_english_only(),
        )?;
        tracing::info!(
            languages = inner.language_tokens.len(),
            "Whisper engine loaded successfully"
        );

        Ok(Self {
            name: repo_id,
            inner: Arc::new(inner),
        })
    }
}

impl SpeechEngine for WhisperEngine {
    fn transcribe(&self, path: &Path, options: &DecodeOptions) -> Result<(DecodeInfo, SegmentStream)> {
        let pcm = decode_file_to_pcm(path)?;
        let duration = duration_secs(pcm.len());
        let inner = Arc::clone(&self.inner);

        let mel = inner.log_mel(&pcm)?;
        let (_, _, mel_frames) = mel.dims3().map_err(model_err("mel dims"))?;
        let content_frames = (pcm.len() / m::HOP_LENGTH).min(mel_frames);

        let (language, language_probability) = inner.resolve_language(options.language.as_deref(), &mel)?;
        tracing::info!(
            language = %language,
            probability = language_probability,
            duration_secs = duration,
            "Starting transcription"
        );

        let mut prompt = vec![inner.special.sot];
        if !inner.english_only {
            let language_token = inner
                .language_tokens
                .iter()
                .find(|(code, _)| *code == language)
                .map(|(_, id)| *id)
                .ok_or_else(|| Error::validation(format!("unsupported language '{}'", language)))?;
            prompt.push(language_token);
        }
        prompt.push(inner.special.transcribe);

        let windows = WindowDecoder {
            model: inner,
            mel,
            mel_frames,
            content_frames,
            seek: 0,
            prompt,
            beam_size: options.beam_size.max(1),
            word_timestamps: options.word_timestamps,
            pending: VecDeque::new(),
            failed: false,
        };

        Ok((
            DecodeInfo {
                language,
                language_probability,
                duration,
            },
            Box::new(windows),
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl LoadedWhisper {
    fn new(
        model: m::model::Whisper,
        tokenizer: Tokenizer,
        config: Config,
        device: Device,
        dtype: DType,
        mel_filters: Vec<f32>,
        english_only: bool,
    ) -> Result<Self> {
        let special = SpecialTokens::from_tokenizer(&tokenizer)?;
        let language_tokens: Vec<(&'static str, u32)> = if english_only {
            Vec::new()
        } else {
            languages::LANGUAGES
                .iter()
                .filter_map(|(code, _)| {
                    tokenizer
                        .token_to_id(&languages::token(code))
                        .map(|id| (*code, id))
                })
                .collect()
        };
        let suppress = suppressed_tokens(&tokenizer, &config, &special, &language_tokens);

        Ok(Self {
            model: Mutex::new(model),
            tokenizer,
            config,
            device,
            dtype,
            mel_filters,
            special,
            language_tokens,
            suppress,
            english_only,
        })
    }

    fn log_mel(&self, pcm: &[f32]) -> Result<Tensor> {
        let mel = m::audio::pcm_to_mel(&self.config, pcm, &self.mel_filters);
        let n_mel = self.config.num_mel_bins;
        let n_frames = mel.len() / n_mel;

        Tensor::from_vec(mel, (1, n_mel, n_frames), &self.device)
            .map_err(model_err("mel tensor"))?
            .to_dtype(self.dtype)
            .map_err(model_err("mel dtype"))
    }

    fn window(&self, mel: &Tensor, mel_frames: usize, seek: usize) -> Result<Tensor> {
        let size = m::N_FRAMES.min(mel_frames - seek);
        mel.narrow(2, seek, size).map_err(model_err("mel window"))
    }

    fn lock_model(&self) -> Result<std::sync::MutexGuard<'_, m::model::Whisper>> {
        self.model
            .lock()
            .map_err(|_| Error::transcription("whisper model lock poisoned"))
    }

    /// Log-probabilities of the token following `tokens`
    fn next_token_logits(
        &self,
        model: &mut m::model::Whisper,
        tokens: &[u32],
        audio_features: &Tensor,
        flush: bool,
    ) -> Result<Vec<f32>> {
        let token_tensor = Tensor::new(tokens, &self.device)
            .map_err(model_err("token tensor"))?
            .unsqueeze(0)
            .map_err(model_err("token tensor"))?;

        let ys = model
            .decoder
            .forward(&token_tensor, audio_features, flush)
            .map_err(model_err("decoder"))?;

        // final_linear works on [batch, seq, d_model]
        let last = ys
            .i((..1, tokens.len() - 1..))
            .map_err(model_err("last position"))?;

        model
            .decoder
            .final_linear(&last)
            .map_err(model_err("final linear"))?
            .i((0, 0))
            .map_err(model_err("logits"))?
            .to_dtype(DType::F32)
            .map_err(model_err("logits"))?
            .to_vec1::<f32>()
            .map_err(model_err("logits"))
    }

    /// Use the hint when given, otherwise pick the most likely language
    /// token after start-of-transcript on the first window.
    fn resolve_language(&self, hint: Option<&str>, mel: &Tensor) -> Result<(String, f64)> {
        if self.english_only {
            return Ok(("en".to_string(), 1.0));
        }

        if let Some(hint) = hint {
            let code = languages::normalize(hint)
                .ok_or_else(|| Error::validation(format!("unsupported language '{}'", hint)))?;
            return Ok((code.to_string(), 1.0));
        }

        let (_, _, mel_frames) = mel.dims3().map_err(model_err("mel dims"))?;
        let first_window = self.window(mel, mel_frames, 0)?;

        let mut model = self.lock_model()?;
        let audio_features = model
            .encoder
            .forward(&first_window, true)
            .map_err(model_err("encoder"))?;
        let logits =
            self.next_token_logits(&mut model, &[self.special.sot], &audio_features, true)?;
        model.reset_kv_cache();
        drop(model);

        let language_logits: Vec<f32> = self
            .language_tokens
            .iter()
            .map(|(_, id)| logits.get(*id as usize).copied().unwrap_or(f32::NEG_INFINITY))
            .collect();
        let probabilities = softmax(&language_logits);

        let (best, probability) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .ok_or_else(|| Error::transcription("model has no language tokens"))?;

        let code = self.language_tokens[best].0;
        tracing::debug!(language = code, probability, "Detected language");
        Ok((code.to_string(), probability as f64))
    }

    /// Beam search over one window. Returns the sampled tokens without the
    /// prompt and without end-of-text.
    fn decode_window(&self, window: &Tensor, prompt: &[u32], beam_size: usize) -> Result<Vec<u32>> {
        let mut model = self.lock_model()?;
        let audio_features = model
            .encoder
            .forward(window, true)
            .map_err(model_err("encoder"))?;

        let max_tokens = self.config.max_target_positions / 2;
        let mut beams = vec![Hypothesis {
            tokens: prompt.to_vec(),
            logprob: 0.0,
        }];
        let mut finished: Vec<Hypothesis> = Vec::new();
        let mut flush = true;

        for _ in 0..max_tokens {
            let mut candidates: Vec<(usize, u32, f64)> = Vec::new();

            for (index, beam) in beams.iter().enumerate() {
                let mut logits =
                    self.next_token_logits(&mut model, &beam.tokens, &audio_features, flush)?;
                flush = false;

                self.apply_token_rules(&mut logits, &beam.tokens[prompt.len()..]);
                let log_probs = log_softmax(&logits);

                for (token, lp) in top_k(&log_probs, beam_size + 1) {
                    candidates.push((index, token, beam.logprob + lp as f64));
                }
            }

            candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

            let mut next_beams = Vec::with_capacity(beam_size);
            for (index, token, logprob) in candidates {
                let parent = &beams[index];
                if token == self.special.eot {
                    if finished.len() < beam_size {
                        finished.push(Hypothesis {
                            tokens: parent.tokens[prompt.len()..].to_vec(),
                            logprob,
                        });
                    }
                } else {
                    let mut tokens = parent.tokens.clone();
                    tokens.push(token);
                    next_beams.push(Hypothesis { tokens, logprob });
                }

                if next_beams.len() == beam_size {
                    break;
                }
            }

            beams = next_beams;
            if finished.len() >= beam_size || beams.is_empty() {
                break;
            }
        }

        model.reset_kv_cache();
        drop(model);

        if finished.is_empty() {
            finished = beams
                .into_iter()
                .map(|h| Hypothesis {
                    tokens: h.tokens[prompt.len()..].to_vec(),
                    logprob: h.logprob,
                })
                .collect();
        }

        Ok(finished
            .into_iter()
            .max_by(|a, b| {
                a.score()
                    .partial_cmp(&b.score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|h| h.tokens)
            .unwrap_or_default())
    }

    /// Suppression and timestamp pairing rules
    fn apply_token_rules(&self, logits: &mut [f32], sampled: &[u32]) {
        let vocab = logits.len();
        let ts_begin = (self.special.timestamp_begin as usize).min(vocab);
        let eot = (self.special.eot as usize).min(vocab);

        for &token in &self.suppress {
            if let Some(logit) = logits.get_mut(token as usize) {
                *logit = f32::NEG_INFINITY;
            }
        }

        let is_ts = |t: u32| self.special.is_timestamp(t);
        let last_was_timestamp = sampled.last().map(|&t| is_ts(t)).unwrap_or(false);
        let penultimate_was_timestamp = sampled.len() < 2 || is_ts(sampled[sampled.len() - 2]);

        if last_was_timestamp {
            if penultimate_was_timestamp {
                mask(logits, ts_begin..vocab);
            } else {
                mask(logits, 0..eot);
            }
        }

        if sampled.is_empty() {
            mask(logits, 0..ts_begin);
            let last_allowed = (ts_begin + MAX_INITIAL_TIMESTAMP_INDEX + 1).min(vocab);
            mask(logits, last_allowed..vocab);
        }

        // timestamps never go backwards
        if let Some(last_ts) = sampled.iter().rev().copied().find(|&t| is_ts(t)) {
            let floor = if last_was_timestamp && !penultimate_was_timestamp {
                last_ts as usize
            } else {
                last_ts as usize + 1
            };
            mask(logits, ts_begin..floor.min(vocab));
        }

        // prefer a timestamp when its total mass beats every text token
        let log_probs = log_softmax(logits);
        let timestamp_mass = log_sum_exp(&log_probs[ts_begin..]);
        let best_text = log_probs[..ts_begin]
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        if timestamp_mass > best_text {
            mask(logits, 0..ts_begin);
        }
    }

    fn timestamp_secs(&self, token: u32) -> f64 {
        (token - self.special.timestamp_begin) as f64 * TIMESTAMP_STEP
    }

    /// Split sampled tokens into segments at timestamp pairs
    fn tokens_to_segments(
        &self,
        tokens: &[u32],
        offset: f64,
        window_secs: f64,
        word_timestamps: bool,
    ) -> Result<Vec<TranscriptionSegment>> {
        let mut segments = Vec::new();
        let mut start: Option<f64> = None;
        let mut text_tokens: Vec<u32> = Vec::new();

        for &token in tokens {
            if self.special.is_timestamp(token) {
                let time = offset + self.timestamp_secs(token);
                if text_tokens.is_empty() {
                    start = Some(time);
                } else {
                    let begin = start.take().unwrap_or(offset);
                    segments.extend(self.build_segment(&text_tokens, begin, time, word_timestamps)?);
                    text_tokens.clear();
                }
            } else if token < self.special.eot {
                text_tokens.push(token);
            }
        }

        if !text_tokens.is_empty() {
            let begin = start.unwrap_or(offset);
            segments.extend(self.build_segment(
                &text_tokens,
                begin,
                offset + window_secs,
                word_timestamps,
            )?);
        }

        Ok(segments)
    }

    fn build_segment(
        &self,
        tokens: &[u32],
        start: f64,
        end: f64,
        word_timestamps: bool,
    ) -> Result<Option<TranscriptionSegment>> {
        let text = self.decode(tokens)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let end = end.max(start);
        let words = if word_timestamps {
            Some(self.interpolate_words(tokens, start, end)?)
        } else {
            None
        };

        Ok(Some(TranscriptionSegment {
            start,
            end,
            text: text.to_string(),
            words,
        }))
    }

    /// Spread `start..end` evenly over the tokens and group them into words
    /// at leading spaces.
    fn interpolate_words(&self, tokens: &[u32], start: f64, end: f64) -> Result<Vec<WordTimestamp>> {
        let step = (end - start) / tokens.len() as f64;
        let mut groups: Vec<(usize, usize)> = Vec::new();

        for (i, &token) in tokens.iter().enumerate() {
            let piece = self.decode(&[token])?;
            match groups.last_mut() {
                Some((_, last)) if !piece.starts_with(' ') => *last = i,
                _ => groups.push((i, i)),
            }
        }

        let mut words = Vec::with_capacity(groups.len());
        for (first, last) in groups {
            let word = self.decode(&tokens[first..=last])?;
            if word.trim().is_empty() {
                continue;
            }
            words.push(WordTimestamp {
                start: start + first as f64 * step,
                end: start + (last + 1) as f64 * step,
                word,
            });
        }

        Ok(words)
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(tokens, true)
            .map_err(|e| Error::transcription(format!("detokenize: {}", e)))
    }
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    logprob: f64,
}

impl Hypothesis {
    fn score(&self) -> f64 {
        self.logprob / self.tokens.len().max(1) as f64
    }
}

/// Lazily decodes one window at a time
struct WindowDecoder {
    model: Arc<LoadedWhisper>,
    mel: Tensor,
    mel_frames: usize,
    content_frames: usize,
    seek: usize,
    prompt: Vec<u32>,
    beam_size: usize,
    word_timestamps: bool,
    pending: VecDeque<TranscriptionSegment>,
    failed: bool,
}

impl WindowDecoder {
    fn decode_next_window(&mut self) -> Result<Vec<TranscriptionSegment>> {
        let window = self.model.window(&self.mel, self.mel_frames, self.seek)?;
        let frames = m::N_FRAMES.min(self.content_frames - self.seek);
        let offset = (self.seek * m::HOP_LENGTH) as f64 / m::SAMPLE_RATE as f64;
        let window_secs = (frames * m::HOP_LENGTH) as f64 / m::SAMPLE_RATE as f64;

        tracing::debug!(offset_secs = offset, "Decoding window");
        let tokens = self.model.decode_window(&window, &self.prompt, self.beam_size)?;
        self.seek += frames;

        self.model
            .tokens_to_segments(&tokens, offset, window_secs, self.word_timestamps)
    }
}

impl Iterator for WindowDecoder {
    type Item = Result<TranscriptionSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(segment) = self.pending.pop_front() {
                return Some(Ok(segment));
            }
            if self.failed || self.seek >= self.content_frames {
                return None;
            }
            match self.decode_next_window() {
                Ok(segments) => self.pending.extend(segments),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| Error::transcription(format!("token not found: {}", token)))
}

fn suppressed_tokens(
    tokenizer: &Tokenizer,
    config: &Config,
    special: &SpecialTokens,
    language_tokens: &[(&'static str, u32)],
) -> Vec<u32> {
    let mut suppress = config.suppress_tokens.clone();
    suppress.extend([special.sot, special.transcribe, special.no_timestamps]);
    suppress.extend(language_tokens.iter().map(|(_, id)| *id));
    for name in [
        "<|translate|>",
        "<|startofprev|>",
        "<|startoflm|>",
        "<|nocaptions|>",
        "<|nospeech|>",
    ] {
        if let Some(id) = tokenizer.token_to_id(name) {
            suppress.push(id);
        }
    }
    suppress.sort_unstable();
    suppress.dedup();
    suppress
}

fn read_mel_filters(bytes: &[u8], config: &Config) -> Result<Vec<f32>> {
    let expected_len = config.num_mel_bins * (m::N_FFT / 2 + 1);
    if bytes.len() < expected_len * 4 {
        return Err(Error::transcription(format!(
            "mel filters file too small: {} bytes, expected at least {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .take(expected_len)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn mask(logits: &mut [f32], range: std::ops::Range<usize>) {
    if range.start < range.end {
        logits[range].fill(f32::NEG_INFINITY);
    }
}

fn log_sum_exp(values: &[f32]) -> f32 {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f32>().ln()
}

fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let norm = log_sum_exp(logits);
    logits.iter().map(|l| l - norm).collect()
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    log_softmax(logits).into_iter().map(f32::exp).collect()
}

/// The `k` most likely finite entries, best first
fn top_k(log_probs: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = log_probs
        .iter()
        .enumerate()
        .filter(|(_, lp)| lp.is_finite())
        .map(|(i, lp)| (i as u32, *lp))
        .collect();

    let by_prob = |a: &(u32, f32), b: &(u32, f32)| {
        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
    };
    if indexed.len() > k {
        indexed.select_nth_unstable_by(k, by_prob);
        indexed.truncate(k);
    }
    indexed.sort_by(by_prob);
    indexed
}
