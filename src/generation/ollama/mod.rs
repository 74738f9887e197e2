
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::GenerationBackend;
use crate::config::GenerationConfig;
use crate::net::{HttpFailure, build_agent, request_with_retry};
use crate::{RagError, Result};

/// Completion client for a local Ollama server (`/api/generate`).
pub struct OllamaChat {
    base_url: Url,
    model: String,
    temperature: f32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaChat {
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let base_url = Url::parse(&config.endpoint)
            .map_err(|e| RagError::Config(format!("invalid Ollama endpoint: {e}")))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
            retry_attempts: config.retry_attempts,
        })
    }
}

impl GenerationBackend for OllamaChat {
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RagError::GenerationRefused(format!("request encoding: {e}")))?;

        let url = self
            .base_url
            .join("/api/generate")
            .map_err(|e| RagError::Config(format!("invalid Ollama URL: {e}")))?;

        debug!("Requesting completion from {} (model {})", url, self.model);

        let response_text = request_with_retry(url.as_str(), self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(|failure| match failure {
            HttpFailure::Timeout(msg) | HttpFailure::Transport(msg) => {
                RagError::GenerationTimeout(format!("Ollama at {}: {msg}", self.base_url))
            }
            HttpFailure::Status(code, msg) => {
                RagError::GenerationRefused(format!("Ollama at {}: HTTP {code} {msg}", self.base_url))
            }
        })?;

        let response: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| RagError::GenerationRefused(format!("unexpected response: {e}")))?;

        let answer = response.response.trim().to_string();
        if answer.is_empty() {
            return Err(RagError::GenerationRefused(
                "backend returned an empty completion".to_string(),
            ));
        }

        Ok(answer)
    }
}
