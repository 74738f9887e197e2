#[cfg(test)]
mod tests;

pub mod ollama;
pub mod openai;

pub use ollama::OllamaChat;
pub use openai::OpenAiChat;

use itertools::Itertools;
use std::fmt::Write;
use tracing::debug;

use crate::config::{Config, GenerationBackendKind};
use crate::index::SearchHit;
use crate::memory::ConversationTurn;
use crate::{RagError, Result};

/// Instruction preamble constraining the model to the provided context.
const GROUNDING_PREAMBLE: &str = "You are a helpful assistant answering questions about a \
specific knowledge base. Answer using ONLY the context passages below. Cite facts from the \
passages rather than general knowledge. If the context does not contain the information \
needed to answer, say that you do not have enough information; never invent an answer.";

/// Canned reply when retrieval found nothing to ground an answer in.
const INSUFFICIENT_CONTEXT_ANSWER: &str = "I don't have enough information in the knowledge \
base to answer that question.";

/// A grounded answer plus the source links of the passages used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub citations: Vec<String>,
}

/// A language-model completion backend. Stateless: one prompt in, one
/// completion out.
pub trait GenerationBackend: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Composes grounded prompts and delegates completion to a backend.
///
/// Holds no conversation state; memory updates are the orchestrator's job.
pub struct AnswerGenerator {
    backend: Box<dyn GenerationBackend>,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(backend: Box<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Construct the generation backend selected in config.
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend: Box<dyn GenerationBackend> = match config.generation.backend {
            GenerationBackendKind::OpenAi => {
                let api_key = Config::openai_api_key()
                    .map_err(|e| RagError::Config(e.to_string()))?;
                Box::new(OpenAiChat::new(&config.generation, api_key))
            }
            GenerationBackendKind::Ollama => Box::new(OllamaChat::new(&config.generation)?),
        };
        Ok(Self::new(backend))
    }

    /// Produce a grounded answer for `query` from the retrieved passages
    /// and recent history.
    ///
    /// When retrieval came back empty there is nothing to ground an answer
    /// in, so a fixed insufficient-context reply is returned without
    /// calling the backend.
    #[inline]
    pub fn generate(
        &self,
        query: &str,
        retrieved: &[SearchHit],
        history: &[ConversationTurn],
    ) -> Result<GeneratedAnswer> {
        if retrieved.is_empty() {
            debug!("No retrieved context for query, declining without backend call");
            return Ok(GeneratedAnswer {
                answer: INSUFFICIENT_CONTEXT_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }

        let prompt = compose_prompt(query, retrieved, history);
        debug!(
            "Composed prompt: {} chars, {} passages, {} history turns",
            prompt.len(),
            retrieved.len(),
            history.len()
        );

        let answer = self.backend.complete(&prompt)?;

        Ok(GeneratedAnswer {
            answer,
            citations: citations_for(retrieved),
        })
    }
}

/// Distinct source links of the retrieved passages, in rank order.
#[inline]
pub fn citations_for(retrieved: &[SearchHit]) -> Vec<String> {
    retrieved
        .iter()
        .map(|hit| hit.chunk.source_link.clone())
        .unique()
        .collect()
}

/// Build the single prompt sent to the backend: preamble, retrieved
/// passages with their sources, recent dialogue, and the new question.
#[inline]
pub fn compose_prompt(query: &str, retrieved: &[SearchHit], history: &[ConversationTurn]) -> String {
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(GROUNDING_PREAMBLE);
    prompt.push_str("\n\nContext passages:\n");

    for (position, hit) in retrieved.iter().enumerate() {
        let _ = write!(
            prompt,
            "\n[{}] (source: {})\n{}\n",
            position + 1,
            hit.chunk.source_link,
            hit.chunk.text
        );
    }

    if !history.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for turn in history {
            let _ = write!(prompt, "User: {}\nAssistant: {}\n", turn.query, turn.answer);
        }
    }

    let _ = write!(prompt, "\nQuestion: {query}\nAnswer:");
    prompt
}
