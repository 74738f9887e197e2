// Embeddings module
// Maps chunk and query text to fixed-dimension vectors via a selectable
// backend.

pub mod ollama;
pub mod openai;

pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

use crate::config::{Config, EmbeddingBackendKind};
use crate::{RagError, Result};

/// A text-to-vector backend. Deterministic for a fixed model: the same
/// text always maps to the same vector.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier of the underlying model, recorded in the persisted index
    /// so a model change invalidates it.
    fn model_id(&self) -> &str;

    /// Output vector width. Every vector this provider produces has this
    /// length; the index enforces it at build time.
    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Construct the embedding backend selected in config.
#[inline]
pub fn provider_from_config(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    match config.embedding.backend {
        EmbeddingBackendKind::Ollama => Ok(Box::new(OllamaEmbedder::new(&config.embedding)?)),
        EmbeddingBackendKind::OpenAi => {
            let api_key = Config::openai_api_key()
                .map_err(|e| RagError::Config(e.to_string()))?;
            Ok(Box::new(OpenAiEmbedder::new(&config.embedding, api_key)?))
        }
    }
}
