//! Tokenizer, weights and tensor helpers shared by the local classifiers

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{Linear, VarBuilder};
use hatescan_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Sequence length every local classifier pads and truncates to
pub const MAX_LENGTH: usize = 128;

/// Map a candle error into a classifier error with context
pub(crate) fn model_err(context: &'static str) -> impl Fn(candle_core::Error) -> Error {
    move |e| Error::classifier(format!("{}: {}", context, e))
}

/// Load the tokenizer from `tokenizer.json`, or build a BERT WordPiece
/// tokenizer from `vocab.txt`, then fix its length to `max_length`.
pub fn load_tokenizer(model_path: &Path, max_length: usize) -> Result<Tokenizer> {
    let mut tokenizer = load_raw_tokenizer(model_path)?;

    let pad_token = "[PAD]".to_string();
    let pad_id = tokenizer.token_to_id(&pad_token).unwrap_or(0);

    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::Fixed(max_length),
        pad_id,
        pad_token,
        ..Default::default()
    }));
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| Error::classifier(format!("Failed to configure truncation: {}", e)))?;

    Ok(tokenizer)
}

fn load_raw_tokenizer(model_path: &Path) -> Result<Tokenizer> {
    let tokenizer_json_path = model_path.join("tokenizer.json");
    if tokenizer_json_path.exists() {
        tracing::debug!("Loading tokenizer from tokenizer.json");
        return Tokenizer::from_file(&tokenizer_json_path)
            .map_err(|e| Error::classifier(format!("Failed to load tokenizer.json: {}", e)));
    }

    let vocab_path = model_path.join("vocab.txt");
    if vocab_path.exists() {
        tracing::debug!("Building tokenizer from vocab.txt");

        use tokenizers::models::wordpiece::WordPiece;
        use tokenizers::normalizers::BertNormalizer;
        use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
        use tokenizers::processors::bert::BertProcessing;

        let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(|e| Error::classifier(format!("Failed to build WordPiece model: {}", e)))?;

        let mut tokenizer = Tokenizer::new(wordpiece);
        tokenizer.with_normalizer(Some(BertNormalizer::default()));
        tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));

        let sep = ("[SEP]".to_string(), tokenizer.token_to_id("[SEP]").unwrap_or(102));
        let cls = ("[CLS]".to_string(), tokenizer.token_to_id("[CLS]").unwrap_or(101));
        tokenizer.with_post_processor(Some(BertProcessing::new(sep, cls)));

        return Ok(tokenizer);
    }

    Err(Error::not_found(format!(
        "No tokenizer found in {} (tried tokenizer.json, vocab.txt)",
        model_path.display()
    )))
}

/// Tokenize one text with special tokens
pub fn encode(tokenizer: &Tokenizer, text: &str) -> Result<Encoding> {
    tokenizer
        .encode(text, true)
        .map_err(|e| Error::classifier(format!("Tokenization failed: {}", e)))
}

/// Build a `(1, seq_len)` tensor from token-level values
pub fn batch_of_one<T: candle_core::WithDType>(values: &[T], device: &Device) -> Result<Tensor> {
    Tensor::new(values, device)
        .map_err(model_err("Failed to create input tensor"))?
        .unsqueeze(0)
        .map_err(model_err("Failed to unsqueeze"))
}

/// Read and parse `config.json`
pub fn parse_json_config<T: DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::not_found(format!(
            "Failed to read config {}: {}",
            config_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::classifier(format!(
            "Failed to parse config {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Open the model weights, preferring safetensors over a PyTorch pickle
pub fn load_var_builder(model_path: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_path.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the mapped file is only read and outlives the builder.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)
                .map_err(model_err("Failed to load weights"))?
        };
        return Ok(vb);
    }

    let pytorch = model_path.join("pytorch_model.bin");
    if pytorch.exists() {
        return VarBuilder::from_pth(&pytorch, DType::F32, device)
            .map_err(model_err("Failed to load pytorch weights"));
    }

    Err(Error::not_found(format!(
        "No weights found in {} (tried model.safetensors, pytorch_model.bin)",
        model_path.display()
    )))
}

/// Load the `classifier` head, or initialize it randomly when the
/// checkpoint has none (base models that were never fine-tuned).
pub fn load_classification_head(
    vb: &VarBuilder,
    hidden_size: usize,
    num_labels: usize,
) -> Result<Linear> {
    if let Ok(linear) = candle_nn::linear(hidden_size, num_labels, vb.pp("classifier")) {
        tracing::info!(
            "Loaded classification head (hidden_size={}, num_labels={})",
            hidden_size,
            num_labels
        );
        return Ok(linear);
    }

    tracing::warn!(
        "No pre-trained classification head found, initializing random weights. \
         Predictions are meaningless until the model is fine-tuned."
    );

    let weight = Tensor::randn(0f32, 0.02, (num_labels, hidden_size), vb.device())
        .map_err(model_err("Failed to init weights"))?;
    let bias = Tensor::zeros((num_labels,), DType::F32, vb.device())
        .map_err(model_err("Failed to init bias"))?;

    Ok(Linear::new(weight, Some(bias)))
}

/// Softmax over the last dimension of `(1, num_labels)` logits
pub fn to_probabilities(logits: &Tensor) -> Result<Vec<f32>> {
    candle_nn::ops::softmax(logits, D::Minus1)
        .map_err(model_err("Softmax failed"))?
        .squeeze(0)
        .map_err(model_err("Squeeze failed"))?
        .to_vec1()
        .map_err(model_err("Failed to convert to vec"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probabilities_sum_to_one() {
        let logits = Tensor::new(&[[1.0f32, 2.0, 3.0]], &Device::Cpu).unwrap();
        let probs = to_probabilities(&logits).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_vocab_tokenizer_is_fixed_length() {
        let dir = std::env::temp_dir().join("hatescan_vocab_tokenizer");
        std::fs::create_dir_all(&dir).unwrap();
        let vocab = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "hello", "world"].join("\n");
        std::fs::write(dir.join("vocab.txt"), vocab).unwrap();

        let tokenizer = load_tokenizer(&dir, 8).unwrap();
        let encoding = encode(&tokenizer, "hello world").unwrap();

        assert_eq!(encoding.get_ids().len(), 8);
        assert_eq!(&encoding.get_ids()[..4], &[2, 4, 5, 3]);
        assert_eq!(&encoding.get_attention_mask()[..5], &[1, 1, 1, 1, 0]);

        let long = "hello ".repeat(20);
        assert_eq!(encode(&tokenizer, &long).unwrap().get_ids().len(), 8);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_tokenizer_is_not_found() {
        let dir = std::env::temp_dir().join("hatescan_no_tokenizer");
        std::fs::create_dir_all(&dir).unwrap();

        let err = load_tokenizer(&dir, MAX_LENGTH).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        std::fs::remove_dir_all(&dir).ok();
    }
}
