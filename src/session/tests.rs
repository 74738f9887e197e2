use super::*;
use crate::RagError;
use crate::config::Config;
use crate::generation::GenerationBackend;
use crate::index::VectorIndex;
use crate::loader::Chunk;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Deterministic word-overlap embedder: dimension slots are letter counts,
/// so texts sharing words land near each other. Good enough to make
/// similarity ordering predictable in tests.
struct TestEmbedder {
    batch_calls: AtomicUsize,
}

impl TestEmbedder {
    fn new() -> Self {
        Self {
            batch_calls: AtomicUsize::new(0),
        }
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector = vec![0.0f32; 26];
        for byte in lower.bytes() {
            if byte.is_ascii_lowercase() {
                vector[usize::from(byte - b'a')] += 1.0;
            }
        }
        vector
    }
}

impl EmbeddingProvider for TestEmbedder {
    fn model_id(&self) -> &str {
        "test-embedder"
    }

    fn dimension(&self) -> usize {
        26
    }

    fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
        Ok(Self::vectorize(text))
    }

    fn embed_batch(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }
}

struct EchoBackend;

impl GenerationBackend for EchoBackend {
    fn complete(&self, _prompt: &str) -> crate::Result<String> {
        Ok("The office is closed on public holidays.".to_string())
    }
}

struct FailingBackend;

impl GenerationBackend for FailingBackend {
    fn complete(&self, _prompt: &str) -> crate::Result<String> {
        Err(RagError::GenerationTimeout("deadline exceeded".to_string()))
    }
}

fn office_chunks() -> Vec<Chunk> {
    vec![Chunk {
        id: "1".to_string(),
        source_link: "#/a".to_string(),
        text: "The office is closed on public holidays.".to_string(),
    }]
}

fn session_over(
    chunks: Vec<Chunk>,
    backend: Box<dyn GenerationBackend>,
    window: usize,
) -> Session {
    let embedder = Arc::new(TestEmbedder::new());
    let vectors: Vec<Vec<f32>> = chunks
        .iter()
        .map(|c| TestEmbedder::vectorize(&c.text))
        .collect();
    let index = Arc::new(
        VectorIndex::build(chunks, vectors, 26, "test-embedder", "fp").expect("build index"),
    );
    let retriever = Retriever::new(embedder, index);
    Session::new(retriever, AnswerGenerator::new(backend), 3, window)
}

#[test]
fn ask_returns_grounded_answer_with_citation() {
    let mut session = session_over(office_chunks(), Box::new(EchoBackend), 8);

    let response = session.ask("When is the office closed?").expect("ask");

    assert_eq!(response.answer, "The office is closed on public holidays.");
    assert_eq!(response.citations, vec!["#/a"]);
    assert_eq!(session.memory().len(), 1);
}

#[test]
fn retrieval_ranks_relevant_chunk_first() {
    let mut chunks = office_chunks();
    chunks.push(Chunk {
        id: "2".to_string(),
        source_link: "#/b".to_string(),
        text: "Parking permits are issued by the city.".to_string(),
    });
    let session = session_over(chunks, Box::new(EchoBackend), 8);

    let hits = session
        .retriever()
        .retrieve("When is the office closed?", 2)
        .expect("retrieve");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.id, "1");
    assert!(hits[0].score >= hits[1].score);
}

#[test]
fn empty_index_yields_insufficient_context_answer() {
    let mut session = session_over(Vec::new(), Box::new(EchoBackend), 8);

    let response = session.ask("Any question at all?").expect("ask");

    assert!(response.answer.contains("don't have enough information"));
    assert!(response.citations.is_empty());
}

#[test]
fn failed_generation_leaves_memory_untouched() {
    let mut session = session_over(office_chunks(), Box::new(FailingBackend), 8);

    let err = session
        .ask("When is the office closed?")
        .expect_err("backend fails");

    assert!(matches!(err, RagError::GenerationTimeout(_)));
    assert!(session.memory().is_empty());
}

#[test]
fn reset_clears_history() {
    let mut session = session_over(office_chunks(), Box::new(EchoBackend), 8);
    session.ask("First question?").expect("ask");
    assert_eq!(session.memory().len(), 1);

    session.reset();

    assert!(session.memory().is_empty());
}

#[test]
fn memory_window_is_enforced_across_turns() {
    let mut session = session_over(office_chunks(), Box::new(EchoBackend), 2);

    session.ask("one?").expect("ask");
    session.ask("two?").expect("ask");
    session.ask("three?").expect("ask");

    let recent = session.memory().recent(10);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].query, "two?");
    assert_eq!(recent[1].query, "three?");
}

fn config_with_content(dir: &std::path::Path, content: &str) -> Config {
    let content_path = dir.join("content_chunks.json");
    std::fs::write(&content_path, content).expect("write content");

    let mut config = Config {
        base_dir: dir.to_path_buf(),
        ..Config::default()
    };
    config.content.path = content_path;
    config
}

const CONTENT_V1: &str =
    r##"[{"source_link": "#/a", "chunk_id": "1", "content": "The office is closed on public holidays."}]"##;
const CONTENT_V2: &str = r##"[
    {"source_link": "#/a", "chunk_id": "1", "content": "The office is closed on public holidays."},
    {"source_link": "#/b", "chunk_id": "2", "content": "The office opens at nine."}
]"##;

#[test]
fn open_or_build_skips_rebuild_when_fingerprint_matches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_content(dir.path(), CONTENT_V1);
    let embedder = TestEmbedder::new();

    let first = open_or_build(&config, &embedder).expect("first build");
    assert_eq!(first.len(), 1);
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);

    let second = open_or_build(&config, &embedder).expect("second open");
    assert_eq!(second.len(), 1);
    assert_eq!(second.fingerprint(), first.fingerprint());
    // No re-embedding happened; the persisted index was reused.
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn open_or_build_rebuilds_when_content_changes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_content(dir.path(), CONTENT_V1);
    let embedder = TestEmbedder::new();

    open_or_build(&config, &embedder).expect("first build");

    std::fs::write(&config.content.path, CONTENT_V2).expect("rewrite content");
    let rebuilt = open_or_build(&config, &embedder).expect("rebuild");

    assert_eq!(rebuilt.len(), 2);
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn open_or_build_recovers_from_corrupt_index_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_content(dir.path(), CONTENT_V1);
    let embedder = TestEmbedder::new();

    open_or_build(&config, &embedder).expect("first build");
    std::fs::write(config.index_path(), b"garbage").expect("corrupt index");

    let recovered = open_or_build(&config, &embedder).expect("rebuild after corruption");

    assert_eq!(recovered.len(), 1);
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn end_to_end_office_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_content(dir.path(), CONTENT_V1);
    let embedder = Arc::new(TestEmbedder::new());

    let index = Arc::new(open_or_build(&config, embedder.as_ref()).expect("build"));
    let retriever = Retriever::new(embedder, index);
    let mut session = Session::new(
        retriever,
        AnswerGenerator::new(Box::new(EchoBackend)),
        config.retrieval.top_k,
        config.memory.window,
    );

    let hits = session
        .retriever()
        .retrieve("When is the office closed?", 3)
        .expect("retrieve");
    assert_eq!(hits[0].chunk.id, "1");

    let response = session.ask("When is the office closed?").expect("ask");
    assert_eq!(response.citations, vec!["#/a"]);
}

#[test]
fn end_to_end_empty_content_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = config_with_content(dir.path(), "[]");
    let embedder = Arc::new(TestEmbedder::new());

    let index = Arc::new(open_or_build(&config, embedder.as_ref()).expect("build"));
    assert!(index.is_empty());

    let retriever = Retriever::new(embedder, index);
    let mut session = Session::new(
        retriever,
        AnswerGenerator::new(Box::new(EchoBackend)),
        3,
        8,
    );

    let response = session.ask("When is the office closed?").expect("ask");
    assert!(response.answer.contains("don't have enough information"));
    assert!(response.citations.is_empty());
}
