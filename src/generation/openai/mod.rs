
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::GenerationBackend;
use crate::config::GenerationConfig;
use crate::net::{HttpFailure, build_agent, request_with_retry};
use crate::{RagError, Result};

/// Chat-completion client for an OpenAI-compatible endpoint.
pub struct OpenAiChat {
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiChat {
    #[inline]
    pub fn new(config: &GenerationConfig, api_key: String) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
            retry_attempts: config.retry_attempts,
        }
    }

    fn parse_answer(response_text: &str) -> Result<String> {
        let response: ChatResponse = serde_json::from_str(response_text)
            .map_err(|e| RagError::GenerationRefused(format!("unexpected response: {e}")))?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            RagError::GenerationRefused("backend returned no choices".to_string())
        })?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            warn!("Backend filtered the completion");
            return Err(RagError::GenerationRefused(
                "completion blocked by content filter".to_string(),
            ));
        }

        choice
            .message
            .content
            .filter(|content| !content.trim().is_empty())
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                RagError::GenerationRefused("backend returned an empty completion".to_string())
            })
    }
}

impl GenerationBackend for OpenAiChat {
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| RagError::GenerationRefused(format!("request encoding: {e}")))?;

        let url = format!("{}/chat/completions", self.endpoint);
        debug!("Requesting completion from {} (model {})", url, self.model);

        let response_text = request_with_retry(&url, self.retry_attempts, || {
            self.agent
                .post(url.as_str())
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .send(&body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
        .map_err(|failure| match failure {
            HttpFailure::Timeout(msg) | HttpFailure::Transport(msg) => {
                RagError::GenerationTimeout(format!("chat endpoint {url}: {msg}"))
            }
            HttpFailure::Status(code, msg) => {
                RagError::GenerationRefused(format!("chat endpoint {url}: HTTP {code} {msg}"))
            }
        })?;

        Self::parse_answer(&response_text)
    }
}
