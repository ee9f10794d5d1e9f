
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::GeminiConfig;
use crate::embeddings::{EmbedTask, Embedder};
use crate::{RagError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// HTTP client for the Gemini `embedContent` endpoint.
///
/// This is a pure boundary: transport and provider failures surface as
/// [`RagError::Embedding`] and no retries happen here, so callers can pick
/// their own retry or fallback policy per call site.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: Url,
    model: String,
    api_key: String,
    dimension: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    task_type: String,
    output_dimensionality: u32,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbedValues,
}

#[derive(Debug, Deserialize)]
struct EmbedValues {
    values: Vec<f32>,
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let base_url = config
            .base_url()
            .map_err(|e| RagError::Config(e.to_string()))?;
        let api_key = config
            .api_key()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            api_key,
            dimension: config.embedding_dimension,
            agent,
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn embed_url(&self) -> Result<Url> {
        self.base_url
            .join(&format!("/v1beta/models/{}:embedContent", self.model))
            .map_err(|e| RagError::Embedding(format!("Failed to build embedding URL: {}", e)))
    }
}

impl Embedder for GeminiClient {
    #[inline]
    fn embed(&self, text: &str, task: EmbedTask) -> Result<Vec<f32>> {
        debug!(
            "Requesting {} embedding for text (length: {})",
            task.task_type(),
            text.len()
        );

        let request = EmbedRequest {
            model: format!("models/{}", self.model),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: task.task_type().to_string(),
            output_dimensionality: self.dimension,
        };

        let url = self.embed_url()?;
        let request_json = serde_json::to_string(&request)
            .map_err(|e| RagError::Embedding(format!("Failed to serialize request: {}", e)))?;

        let response_text = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .send(&request_json)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|e| RagError::Embedding(format!("Embedding request failed: {}", e)))?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::Embedding(format!("Failed to parse response: {}", e)))?;

        let values = response.embedding.values;
        if values.is_empty() {
            return Err(RagError::Embedding(
                "Provider returned an empty embedding".to_string(),
            ));
        }

        debug!("Received embedding with {} dimensions", values.len());
        Ok(values)
    }
}
