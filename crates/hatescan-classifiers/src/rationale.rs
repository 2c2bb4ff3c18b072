//! Binary BERT rationale classifier (NORMAL / ABUSIVE)
//!
//! The checkpoint was trained jointly on a sentence label and a per-token
//! rationale mask. Only the sentence head runs here; the `token_classifier`
//! weights stay in the file untouched.

use crate::classifier::Classifier;
use crate::config::LocalModelSettings;
use crate::encoding::{
    batch_of_one, encode, load_classification_head, load_tokenizer, load_var_builder,
    model_err, parse_json_config, to_probabilities, MAX_LENGTH,
};
use async_trait::async_trait;
use candle_core::{Device, IndexOp};
use candle_nn::{Linear, Module};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hatescan_core::{
    device_from_str, resolve_model_dir, ClassificationResult, Error, ModelSlot, ModelState,
    Result, Taxonomy,
};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::info;

/// BERT sentence classifier with the HateXplain rationale architecture
pub struct RationaleClassifier {
    name: String,
    settings: LocalModelSettings,
    slot: ModelSlot<LoadedRationale>,
}

impl RationaleClassifier {
    pub fn new(settings: LocalModelSettings) -> Self {
        Self {
            name: "bert-rationale-binary".to_string(),
            settings,
            slot: ModelSlot::new(),
        }
    }

    async fn model(&self) -> Result<Arc<LoadedRationale>> {
        let settings = self.settings.clone();
        self.slot
            .get_or_load(|| async move {
                tokio::task::spawn_blocking(move || LoadedRationale::load(&settings))
                    .await
                    .map_err(|e| Error::internal(format!("Model loading task failed: {}", e)))?
            })
            .await
    }
}

#[async_trait]
impl Classifier for RationaleClassifier {
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
            ClassificationResult::from_probabilities(Taxonomy::Binary, &probabilities)?
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
        Taxonomy::Binary
    }
}

/// Dense + tanh over the first token
struct RationalePooler {
    dense: Linear,
}

impl RationalePooler {
    fn load(vb: candle_nn::VarBuilder, hidden_size: usize) -> Result<Self> {
        let dense = candle_nn::linear(hidden_size, hidden_size, vb.pp("dense"))
            .map_err(model_err("Failed to load bert_pooler"))?;
        Ok(Self { dense })
    }

    fn forward(&self, hidden_states: &candle_core::Tensor) -> Result<candle_core::Tensor> {
        let first_token = hidden_states
            .i((.., 0, ..))
            .map_err(model_err("Failed to get CLS token"))?;
        self.dense
            .forward(&first_token)
            .map_err(model_err("Pooler dense failed"))?
            .tanh()
            .map_err(model_err("Pooler activation failed"))
    }
}

struct LoadedRationale {
    tokenizer: Tokenizer,
    bert: BertModel,
    pooler: RationalePooler,
    classifier: Linear,
    device: Device,
}

impl LoadedRationale {
    fn load(settings: &LocalModelSettings) -> Result<Self> {
        let model_path = resolve_model_dir(&settings.location())?;
        info!("Loading rationale classifier from {}", model_path.display());

        let tokenizer = load_tokenizer(&model_path, MAX_LENGTH)?;
        let bert_config: BertConfig = parse_json_config(&model_path.join("config.json"))?;
        let hidden_size = bert_config.hidden_size;

        let device = device_from_str(&settings.device)?;
        let vb = load_var_builder(&model_path, &device)?;

        let bert = BertModel::load(vb.pp("bert"), &bert_config)
            .map_err(model_err("Failed to load BERT backbone"))?;
        let pooler = RationalePooler::load(vb.pp("bert_pooler"), hidden_size)?;
        let classifier = load_classification_head(&vb, hidden_size, Taxonomy::Binary.len())?;

        info!("Rationale classifier ready (hidden_size={})", hidden_size);

        Ok(Self {
            tokenizer,
            bert,
            pooler,
            classifier,
            device,
        })
    }

    fn predict(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = encode(&self.tokenizer, text)?;

        let input_ids = batch_of_one(encoding.get_ids(), &self.device)?;
        let token_type_ids = batch_of_one(encoding.get_type_ids(), &self.device)?;
        let attention_mask = batch_of_one(encoding.get_attention_mask(), &self.device)?;

        let hidden_states = self
            .bert
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(model_err("Model forward pass failed"))?;

        let pooled = self.pooler.forward(&hidden_states)?;
        let logits = self
            .classifier
            .forward(&pooled)
            .map_err(model_err("Classification head failed"))?;

        to_probabilities(&logits)
    }
}
