
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::net::{build_agent, request_with_retry};
use crate::{RagError, Result};

/// Embedding client for an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    endpoint: String,
    api_key: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            dimension: config.dimension as usize,
            batch_size: config.batch_size as usize,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
            retry_attempts: config.retry_attempts,
        })
    }

    fn embed_one_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RagError::EmbeddingUnavailable(format!("request encoding: {e}")))?;

        let url = format!("{}/embeddings", self.endpoint);
        let response_text = request_with_retry(&url, self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .send(&body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(|failure| {
            RagError::EmbeddingUnavailable(format!("embeddings endpoint {url}: {failure}"))
        })?;

        let response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::EmbeddingUnavailable(format!("unexpected response: {e}")))?;

        if response.data.len() != texts.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "requested {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }

        // The API may return data out of order; index restores it.
        let mut data = response.data;
        data.sort_by_key(|d| d.index);

        let mut vectors = Vec::with_capacity(data.len());
        for datum in data {
            if datum.embedding.len() != self.dimension {
                return Err(RagError::DimensionMismatch {
                    expected: self.dimension,
                    actual: datum.embedding.len(),
                });
            }
            vectors.push(datum.embedding);
        }

        Ok(vectors)
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_one_batch(&[text.to_string()])?;
        vectors.pop().ok_or_else(|| {
            RagError::EmbeddingUnavailable("empty embeddings response".to_string())
        })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            results.extend(self.embed_one_batch(batch)?);
        }
        Ok(results)
    }
}
