
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::{RagError, Result};

/// A unit of knowledge-base text with stable identity and source reference.
///
/// Chunks arrive pre-split from the upstream scrape/chunk pipeline; this
/// crate never re-chunks them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source_link: String,
    pub text: String,
}

/// Raw on-disk record shape. The upstream scraper historically emitted
/// `data_link`, so that name is accepted as an alias.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(alias = "data_link")]
    source_link: Option<String>,
    chunk_id: Option<String>,
    content: Option<String>,
}

/// Load content records from a JSON file into validated chunks.
#[inline]
pub fn load_records_from_file<P: AsRef<Path>>(path: P, base_url: &str) -> Result<Vec<Chunk>> {
    let bytes = std::fs::read(path.as_ref())?;
    debug!(
        "Read {} bytes of content from {}",
        bytes.len(),
        path.as_ref().display()
    );
    load_records(&bytes, base_url)
}

/// Parse a JSON array of `{source_link, chunk_id, content}` records into
/// chunks, completing relative source links against `base_url`.
///
/// Fails with [`RagError::MalformedRecord`] when a record is missing a
/// required field or a `chunk_id` repeats within the batch.
#[inline]
pub fn load_records(bytes: &[u8], base_url: &str) -> Result<Vec<Chunk>> {
    let records: Vec<RawRecord> = serde_json::from_slice(bytes)
        .map_err(|e| RagError::MalformedRecord(format!("invalid content JSON: {e}")))?;

    let mut seen_ids = HashSet::with_capacity(records.len());
    let mut chunks = Vec::with_capacity(records.len());

    for (position, record) in records.into_iter().enumerate() {
        let id = record
            .chunk_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                RagError::MalformedRecord(format!("record {position} is missing chunk_id"))
            })?;

        let source_link = record.source_link.ok_or_else(|| {
            RagError::MalformedRecord(format!(
                "record {position} (chunk_id {id}) is missing source_link"
            ))
        })?;

        let text = record
            .content
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| {
                RagError::MalformedRecord(format!(
                    "record {position} (chunk_id {id}) is missing content"
                ))
            })?;

        if !seen_ids.insert(id.clone()) {
            return Err(RagError::MalformedRecord(format!(
                "duplicate chunk_id: {id}"
            )));
        }

        chunks.push(Chunk {
            id,
            source_link: complete_source_link(&source_link, base_url),
            text,
        });
    }

    info!("Loaded {} content chunks", chunks.len());
    Ok(chunks)
}

/// Complete a source link against the knowledge-base base URL.
///
/// Fragment links (`#section`) attach directly to the base URL; other
/// relative links are joined under it. Absolute links pass through, and an
/// empty base URL disables completion entirely.
fn complete_source_link(link: &str, base_url: &str) -> String {
    if base_url.is_empty() || link.starts_with("http://") || link.starts_with("https://") {
        return link.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if link.starts_with('#') {
        format!("{base}{link}")
    } else {
        format!("{base}/{}", link.trim_start_matches('/'))
    }
}

/// SHA-256 hex digest of the raw content bytes.
///
/// Used as the staleness fingerprint for the persisted vector index: the
/// index is rebuilt only when this value changes.
#[inline]
pub fn content_fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}
