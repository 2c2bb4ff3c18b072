//! Prompt-based classifier backed by an Ollama `/api/generate` endpoint

use crate::classifier::Classifier;
use crate::config::RemotePromptSettings;
use crate::reply::ReplyParser;
use async_trait::async_trait;
use hatescan_core::{ClassificationResult, Error, ModelSlot, ModelState, Result, Taxonomy};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Moderation instruction sent ahead of every text
pub const SYSTEM_PROMPT: &str = r#"You are a content moderation AI. Analyze the given text and classify it as either NORMAL or ABUSIVE.

NORMAL: Regular, non-offensive content including casual conversation, questions, statements, jokes without hate, etc.
ABUSIVE: Content containing hate speech, harassment, threats, slurs, discriminatory language, or extreme offensive content.

Respond ONLY in this exact JSON format:
{"class": "NORMAL", "confidence": 0.95, "reasoning": "brief explanation"}
or
{"class": "ABUSIVE", "confidence": 0.87, "reasoning": "brief explanation"}

Be conservative - only mark content as ABUSIVE if it clearly contains hate speech or harassment."#;

/// Build the full prompt for one text
pub fn build_prompt(text: &str) -> String {
    format!(
        "{}\n\nText to analyze: \"{}\"\n\nClassification:",
        SYSTEM_PROMPT, text
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Classifier that prompts a generative model over HTTP.
///
/// Each call is an independent round trip; nothing is batched or cached.
pub struct RemotePromptClassifier {
    name: String,
    settings: RemotePromptSettings,
    generate_url: Url,
    client: Client,
    parser: ReplyParser,
    lifecycle: ModelSlot<()>,
}

impl RemotePromptClassifier {
    pub fn new(settings: RemotePromptSettings) -> Result<Self> {
        let generate_url = resolve_generate_url(&settings.endpoint)?;

        let client = Client::builder()
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: format!("remote-prompt:{}", settings.model),
            settings,
            generate_url,
            client,
            parser: ReplyParser::new()?,
            lifecycle: ModelSlot::new(),
        })
    }

    /// URL prompts are posted to
    pub fn generate_url(&self) -> &Url {
        &self.generate_url
    }

    async fn generate(
        &self,
        prompt: &str,
        options: Option<GenerateOptions>,
        timeout: Duration,
    ) -> Result<String> {
        let request = GenerateRequest {
            model: &self.settings.model,
            prompt,
            stream: false,
            options,
        };

        let response = self
            .client
            .post(self.generate_url.clone())
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::transport(format!(
                "Remote classifier API error: {}",
                status
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(transport_error)?;
        Ok(body.response.trim().to_string())
    }

    /// One short request to check the model answers. Failure is only logged.
    async fn probe(&self) {
        let timeout = Duration::from_secs(self.settings.probe_timeout_secs);
        match self.generate("test", None, timeout).await {
            Ok(_) => info!(
                "Connected to remote classifier {} at {}",
                self.settings.model, self.settings.endpoint
            ),
            Err(e) => warn!(
                "Remote classifier not reachable at {}: {}. Make sure Ollama is running (ollama serve)",
                self.settings.endpoint, e
            ),
        }
    }
}

#[async_trait]
impl Classifier for RemotePromptClassifier {
    async fn load(&self) -> Result<()> {
        self.lifecycle
            .get_or_load(|| async {
                self.probe().await;
                Ok(())
            })
            .await
            .map(|_| ())
    }

    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        self.load().await?;
        let start = Instant::now();

        let options = GenerateOptions {
            temperature: self.settings.temperature,
            num_predict: self.settings.num_predict,
        };
        let timeout = Duration::from_secs(self.settings.timeout_secs);
        let reply = self
            .generate(&build_prompt(text), Some(options), timeout)
            .await?;
        debug!("Remote classifier reply: {:?}", reply);

        Ok(self
            .parser
            .parse(&reply)?
            .with_latency_us(start.elapsed().as_micros() as u64))
    }

    async fn unload(&self) {
        self.lifecycle.unload().await;
    }

    fn state(&self) -> ModelState {
        self.lifecycle.state()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn taxonomy(&self) -> Taxonomy {
        Taxonomy::Binary
    }
}

fn resolve_generate_url(endpoint: &str) -> Result<Url> {
    let mut base = Url::parse(endpoint)
        .map_err(|e| Error::config(format!("Invalid remote endpoint '{}': {}", endpoint, e)))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("api/generate")
        .map_err(|e| Error::config(format!("Invalid remote endpoint '{}': {}", endpoint, e)))
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::transport("Remote classifier request timed out - model may be slow or unavailable")
    } else if e.is_connect() {
        Error::transport(format!("Failed to connect to remote classifier: {}", e))
    } else {
        Error::transport(format!("Remote classifier request failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url() {
        assert_eq!(
            resolve_generate_url("http://localhost:11434").unwrap().as_str(),
            "http://localhost:11434/api/generate"
        );
        assert_eq!(
            resolve_generate_url("http://gateway:8080/ollama").unwrap().as_str(),
            "http://gateway:8080/ollama/api/generate"
        );
        assert!(resolve_generate_url("not a url").is_err());
    }

    #[test]
    fn test_prompt_embeds_text() {
        let prompt = build_prompt("you are great");
        assert!(prompt.starts_with("You are a content moderation AI."));
        assert!(prompt.ends_with("Text to analyze: \"you are great\"\n\nClassification:"));
    }

    #[test]
    fn test_request_body_shape() {
        let request = GenerateRequest {
            model: "llama3.2:3b",
            prompt: "hi",
            stream: false,
            options: Some(GenerateOptions {
                temperature: 0.1,
                num_predict: 150,
            }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 150);

        let probe = GenerateRequest {
            model: "llama3.2:3b",
            prompt: "test",
            stream: false,
            options: None,
        };
        assert!(serde_json::to_value(&probe).unwrap().get("options").is_none());
    }
}
