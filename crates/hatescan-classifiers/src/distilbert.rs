//! Three-way DistilBERT classifier (HATE_SPEECH / OFFENSIVE / NEITHER)

use crate::annotator::Annotation;
use crate::classifier::Classifier;
use crate::config::LocalModelSettings;
use crate::encoding::{
    batch_of_one, encode, load_classification_head, load_tokenizer, load_var_builder,
    model_err, parse_json_config, to_probabilities, MAX_LENGTH,
};
use async_trait::async_trait;
use candle_core::{Device, IndexOp};
use candle_nn::{Linear, Module};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use hatescan_core::{
    device_from_str, resolve_model_dir, ClassificationResult, Error, ModelSlot, ModelState,
    Result, Taxonomy,
};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::info;

/// DistilBERT sequence classifier over the three-way taxonomy.
///
/// Sentences are expected with sequential `<i>..<i>` markers.
pub struct DistilBertClassifier {
    name: String,
    settings: LocalModelSettings,
    slot: ModelSlot<LoadedDistilBert>,
}

impl DistilBertClassifier {
    pub fn new(settings: LocalModelSettings) -> Self {
        Self {
            name: "distilbert-hate-speech".to_string(),
            settings,
            slot: ModelSlot::new(),
        }
    }

    async fn model(&self) -> Result<Arc<LoadedDistilBert>> {
        let settings = self.settings.clone();
        self.slot
            .get_or_load(|| async move {
                tokio::task::spawn_blocking(move || LoadedDistilBert::load(&settings))
                    .await
                    .map_err(|e| Error::internal(format!("Model loading task failed: {}", e)))?
            })
            .await
    }
}

#[async_trait]
impl Classifier for DistilBertClassifier {
    async fn load(&self) -> Result<()> {
        self.model().await.map(|_| ())
    }

    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let model = self.model().await?;
        let text = text.to_string();
        let start = Instant::now();

        let probabilities = tokio::task::spawn_blocking(move || model.predict(&text))
            .await
            .map_err(|e| Error::internal(format!("Inference task failed: {}", e)))??;

        Ok(
            ClassificationResult::from_probabilities(Taxonomy::ThreeWay, &probabilities)?
                .with_latency_us(start.elapsed().as_micros() as u64),
        )
    }

    async fn unload(&self) {
        if self.slot.unload().await {
            info!("Unloaded {}", self.name);
        }
    }

    fn state(&self) -> ModelState {
        self.slot.state()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn taxonomy(&self) -> Taxonomy {
        Taxonomy::ThreeWay
    }

    fn annotation(&self) -> Annotation {
        Annotation::Sequential
    }
}

struct LoadedDistilBert {
    tokenizer: Tokenizer,
    model: DistilBertModel,
    pre_classifier: Option<Linear>,
    classifier: Linear,
    device: Device,
}

impl LoadedDistilBert {
    fn load(settings: &LocalModelSettings) -> Result<Self> {
        let model_path = resolve_model_dir(&settings.location())?;
        info!("Loading DistilBERT classifier from {}", model_path.display());

        let tokenizer = load_tokenizer(&model_path, MAX_LENGTH)?;

        let config_path = model_path.join("config.json");
        let config_json: serde_json::Value = parse_json_config(&config_path)?;
        let hidden_size = config_json
            .get("dim")
            .or_else(|| config_json.get("hidden_size"))
            .and_then(|v| v.as_u64())
            .unwrap_or(768) as usize;
        let distilbert_config: DistilBertConfig = parse_json_config(&config_path)?;

        let device = device_from_str(&settings.device)?;
        let vb = load_var_builder(&model_path, &device)?;

        let model = DistilBertModel::load(vb.pp("distilbert"), &distilbert_config)
            .map_err(model_err("Failed to load DistilBERT model"))?;

        let pre_classifier =
            candle_nn::linear(hidden_size, hidden_size, vb.pp("pre_classifier")).ok();
        let classifier =
            load_classification_head(&vb, hidden_size, Taxonomy::ThreeWay.len())?;

        info!(
            "DistilBERT classifier ready (hidden_size={}, pre_classifier={})",
            hidden_size,
            pre_classifier.is_some()
        );

        Ok(Self {
            tokenizer,
            model,
            pre_classifier,
            classifier,
            device,
        })
    }

    fn predict(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = encode(&self.tokenizer, text)?;

        let input_ids = batch_of_one(encoding.get_ids(), &self.device)?;

        // DistilBERT masks positions where the mask is 1
        let padding_mask: Vec<u8> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| u8::from(x == 0))
            .collect();
        let attention_mask = batch_of_one(&padding_mask, &self.device)?;

        let hidden_states = self
            .model
            .forward(&input_ids, &attention_mask)
            .map_err(model_err("Model forward pass failed"))?;

        let cls_embedding = hidden_states
            .i((.., 0, ..))
            .map_err(model_err("Failed to get CLS token"))?;

        let pooled_output = match &self.pre_classifier {
            Some(pre_classifier) => pre_classifier
                .forward(&cls_embedding)
                .map_err(model_err("Pre-classifier failed"))?
                .relu()
                .map_err(model_err("ReLU failed"))?,
            None => cls_embedding,
        };

        let logits = self
            .classifier
            .forward(&pooled_output)
            .map_err(model_err("Classification head failed"))?;

        to_probabilities(&logits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_model_directory_is_not_found() {
        let classifier = DistilBertClassifier::new(LocalModelSettings::local(
            std::env::temp_dir().join("hatescan_missing_three_way_model"),
        ));

        let err = classifier.classify("hello").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(classifier.state(), ModelState::Unloaded);
    }

    #[test]
    fn test_taxonomy_and_annotation() {
        let classifier = DistilBertClassifier::new(LocalModelSettings::three_way());
        assert_eq!(classifier.taxonomy(), Taxonomy::ThreeWay);
        assert_eq!(classifier.annotation(), Annotation::Sequential);
        assert_eq!(classifier.state(), ModelState::Unloaded);
    }
}
