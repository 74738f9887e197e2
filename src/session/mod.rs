#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::{EmbeddingProvider, provider_from_config};
use crate::generation::AnswerGenerator;
use crate::index::{SearchHit, VectorIndex};
use crate::loader::{content_fingerprint, load_records};
use crate::memory::{ConversationMemory, ConversationTurn};
use crate::Result;

/// What the UI collaborator gets back from one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub answer: String,
    pub citations: Vec<String>,
}

/// Embeds a query and finds the closest chunks in the shared index.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Top-`k` chunks most similar to `query`, best first.
    #[inline]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let query_vector = self.embedder.embed(query)?;
        let hits = self.index.search(&query_vector, k)?;
        debug!("Retrieved {} chunks for query", hits.len());
        Ok(hits)
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// One user conversation: owns its memory, shares the index read-only.
///
/// A session processes one `ask` at a time (it takes `&mut self`), so
/// memory never observes interleaved turns.
pub struct Session {
    retriever: Retriever,
    generator: AnswerGenerator,
    memory: ConversationMemory,
    top_k: usize,
}

impl Session {
    #[inline]
    pub fn new(
        retriever: Retriever,
        generator: AnswerGenerator,
        top_k: usize,
        memory_window: usize,
    ) -> Self {
        Self {
            retriever,
            generator,
            memory: ConversationMemory::new(memory_window),
            top_k,
        }
    }

    /// Wire up a session from config: embedding backend, build-or-load
    /// index, generation backend, fresh memory.
    #[inline]
    pub fn bootstrap(config: &Config) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(provider_from_config(config)?);
        let index = Arc::new(open_or_build(config, embedder.as_ref())?);
        let retriever = Retriever::new(embedder, index);
        let generator = AnswerGenerator::from_config(config)?;

        Ok(Self::new(
            retriever,
            generator,
            config.retrieval.top_k,
            config.memory.window,
        ))
    }

    /// Answer one question: retrieve, generate, then record the turn.
    ///
    /// Memory is appended only after generation succeeds, so a failed turn
    /// leaves the conversation history exactly as it was.
    #[inline]
    pub fn ask(&mut self, query: &str) -> Result<ChatResponse> {
        let hits = self.retriever.retrieve(query, self.top_k)?;
        let history = self.memory.recent(self.memory.capacity());
        let generated = self.generator.generate(query, &hits, &history)?;

        self.memory
            .append(ConversationTurn::new(query, generated.answer.as_str()));

        Ok(ChatResponse {
            answer: generated.answer,
            citations: generated.citations,
        })
    }

    /// Forget the conversation so far.
    #[inline]
    pub fn reset(&mut self) {
        info!("Resetting conversation memory");
        self.memory.clear();
    }

    #[inline]
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }
}

/// Load the persisted index when it still matches the content snapshot and
/// embedding model; otherwise re-embed and rebuild.
///
/// This is the caching discipline that keeps startup cheap: at most one
/// rebuild per content change, reuse otherwise. A corrupt or stale index
/// file forces a rebuild rather than an error.
#[inline]
pub fn open_or_build(config: &Config, embedder: &dyn EmbeddingProvider) -> Result<VectorIndex> {
    let content_path = &config.content.path;
    let bytes = std::fs::read(content_path)?;
    let fingerprint = content_fingerprint(&bytes);
    let chunks = load_records(&bytes, &config.content.base_url)?;

    let index_path = config.index_path();
    if index_path.exists() {
        match VectorIndex::load(&index_path) {
            Ok(index)
                if index.fingerprint() == fingerprint
                    && index.model_id() == embedder.model_id()
                    && index.dimension() == embedder.dimension() =>
            {
                info!(
                    "Reusing persisted index ({} chunks, fingerprint match)",
                    index.len()
                );
                return Ok(index);
            }
            Ok(index) => {
                info!(
                    "Persisted index is stale (fingerprint {} != {} or model {} != {}), rebuilding",
                    index.fingerprint(),
                    fingerprint,
                    index.model_id(),
                    embedder.model_id()
                );
            }
            Err(e) => {
                warn!("Persisted index unusable ({}), rebuilding", e);
            }
        }
    }

    info!("Embedding {} chunks to build index", chunks.len());
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts)?;

    let index = VectorIndex::build(
        chunks,
        vectors,
        embedder.dimension(),
        embedder.model_id(),
        fingerprint,
    )?;
    index.save(&index_path)?;

    Ok(index)
}
