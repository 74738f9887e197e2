
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::loader::Chunk;
use crate::{RagError, Result};

/// On-disk layout version. Bumped on any incompatible change; a persisted
/// index with a different version is treated as corrupt and rebuilt.
const FORMAT_VERSION: u32 = 1;

/// A retrieved chunk with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Serialized index file: vectors plus metadata, MessagePack-encoded.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IndexFile {
    pub(crate) format_version: u32,
    pub(crate) model: String,
    pub(crate) dimension: usize,
    pub(crate) fingerprint: String,
    pub(crate) chunks: Vec<Chunk>,
    pub(crate) vectors: Vec<Vec<f32>>,
}

/// In-memory nearest-neighbor index over embedded chunks.
///
/// Built once from a content snapshot and shared read-only afterwards.
/// Search is exact brute-force cosine similarity; at knowledge-base scale
/// (hundreds to low thousands of chunks) this beats maintaining an ANN
/// structure.
#[derive(Debug)]
pub struct VectorIndex {
    model: String,
    dimension: usize,
    fingerprint: String,
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index from chunks and their embedding vectors.
    ///
    /// `dimension` is the embedding model's output width; every vector must
    /// match it, and vectors must pair one-to-one with chunks.
    #[inline]
    pub fn build(
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        dimension: usize,
        model: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(RagError::CorruptIndex(format!(
                "chunk count {} does not match vector count {}",
                chunks.len(),
                vectors.len()
            )));
        }

        for vector in &vectors {
            if vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
        }

        debug!(
            "Built vector index: {} chunks, {} dimensions",
            chunks.len(),
            dimension
        );

        Ok(Self {
            model: model.into(),
            dimension,
            fingerprint: fingerprint.into(),
            chunks,
            vectors,
        })
    }

    /// Return up to `k` chunks ranked by descending cosine similarity.
    ///
    /// An empty index yields an empty result, not an error.
    #[inline]
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if self.chunks.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        let mut hits: Vec<SearchHit> = self
            .chunks
            .iter()
            .zip(self.vectors.iter())
            .map(|(chunk, vector)| SearchHit {
                chunk: chunk.clone(),
                score: cosine_similarity(query_vector, vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);

        debug!("Search returned {} hits (k = {})", hits.len(), k);
        Ok(hits)
    }

    /// Persist the full index (vectors + metadata) to a MessagePack file.
    ///
    /// Writes to a sibling temp file and renames it into place so readers
    /// never observe a partial index.
    #[inline]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = IndexFile {
            format_version: FORMAT_VERSION,
            model: self.model.clone(),
            dimension: self.dimension,
            fingerprint: self.fingerprint.clone(),
            chunks: self.chunks.clone(),
            vectors: self.vectors.clone(),
        };

        let encoded = rmp_serde::to_vec(&file)
            .map_err(|e| RagError::CorruptIndex(format!("failed to encode index: {e}")))?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, &encoded)?;
        std::fs::rename(&tmp_path, path)?;

        info!(
            "Saved index ({} chunks, {} bytes) to {}",
            self.chunks.len(),
            encoded.len(),
            path.display()
        );
        Ok(())
    }

    /// Restore a persisted index, validating structural consistency.
    #[inline]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;

        let file: IndexFile = rmp_serde::from_slice(&bytes)
            .map_err(|e| RagError::CorruptIndex(format!("failed to decode index: {e}")))?;

        if file.format_version != FORMAT_VERSION {
            return Err(RagError::CorruptIndex(format!(
                "unsupported index format version {} (expected {})",
                file.format_version, FORMAT_VERSION
            )));
        }

        if file.chunks.len() != file.vectors.len() {
            return Err(RagError::CorruptIndex(format!(
                "chunk count {} does not match vector count {}",
                file.chunks.len(),
                file.vectors.len()
            )));
        }

        if let Some(bad) = file.vectors.iter().find(|v| v.len() != file.dimension) {
            warn!(
                "Index at {} has vector of length {} where {} was declared",
                path.display(),
                bad.len(),
                file.dimension
            );
            return Err(RagError::CorruptIndex(format!(
                "vector length {} does not match declared dimension {}",
                bad.len(),
                file.dimension
            )));
        }

        info!(
            "Loaded index ({} chunks, model {}) from {}",
            file.chunks.len(),
            file.model,
            path.display()
        );

        Ok(Self {
            model: file.model,
            dimension: file.dimension,
            fingerprint: file.fingerprint,
            chunks: file.chunks,
            vectors: file.vectors,
        })
    }

    #[inline]
    pub fn model_id(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Fingerprint of the content snapshot this index was built from.
    #[inline]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Cosine similarity between two equal-length vectors.
///
/// Zero vectors compare as 0.0 rather than NaN.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}
