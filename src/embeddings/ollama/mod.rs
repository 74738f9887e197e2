
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::net::{build_agent, request_with_retry};
use crate::{RagError, Result};

/// Embedding client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: Url,
    model: String,
    dimension: usize,
    batch_size: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    model: String,
    #[serde(rename = "input")]
    inputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .map_err(|e| RagError::Config(e.to_string()))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            dimension: config.dimension as usize,
            batch_size: config.batch_size as usize,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
            retry_attempts: config.retry_attempts,
        })
    }

    fn post_json(&self, path: &str, body: &str) -> Result<String> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| RagError::Config(format!("invalid Ollama URL: {e}")))?;

        request_with_retry(url.as_str(), self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(|failure| {
            RagError::EmbeddingUnavailable(format!("Ollama at {}: {failure}", self.base_url))
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RagError::EmbeddingUnavailable(format!("request encoding: {e}")))?;

        let response_text = self.post_json("/api/embed", &body)?;
        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::EmbeddingUnavailable(format!("unexpected response: {e}")))?;

        self.check_dimension(&response.embedding)?;
        Ok(response.embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let request = BatchEmbedRequest {
                model: self.model.clone(),
                inputs: batch.to_vec(),
            };
            let body = serde_json::to_string(&request)
                .map_err(|e| RagError::EmbeddingUnavailable(format!("request encoding: {e}")))?;

            let response_text = self.post_json("/api/embed", &body)?;
            let response: BatchEmbedResponse = serde_json::from_str(&response_text)
                .map_err(|e| RagError::EmbeddingUnavailable(format!("unexpected response: {e}")))?;

            if response.embeddings.len() != batch.len() {
                return Err(RagError::EmbeddingUnavailable(format!(
                    "requested {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            for vector in &response.embeddings {
                self.check_dimension(vector)?;
            }

            results.extend(response.embeddings);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}
