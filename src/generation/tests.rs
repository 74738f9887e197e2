use super::*;
use crate::loader::Chunk;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CannedBackend {
    answer: String,
    calls: Arc<AtomicUsize>,
}

impl GenerationBackend for CannedBackend {
    fn complete(&self, _prompt: &str) -> crate::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

struct FailingBackend;

impl GenerationBackend for FailingBackend {
    fn complete(&self, _prompt: &str) -> crate::Result<String> {
        Err(crate::RagError::GenerationTimeout(
            "deadline exceeded".to_string(),
        ))
    }
}

fn hit(id: &str, link: &str, text: &str, score: f32) -> SearchHit {
    SearchHit {
        chunk: Chunk {
            id: id.to_string(),
            source_link: link.to_string(),
            text: text.to_string(),
        },
        score,
    }
}

#[test]
fn prompt_contains_context_history_and_query() {
    let hits = vec![
        hit("1", "#/hours", "The office opens at nine.", 0.9),
        hit("2", "#/address", "The office is on Main Street.", 0.7),
    ];
    let history = vec![ConversationTurn::new("Where is it?", "On Main Street.")];

    let prompt = compose_prompt("When does it open?", &hits, &history);

    assert!(prompt.contains("The office opens at nine."));
    assert!(prompt.contains("(source: #/hours)"));
    assert!(prompt.contains("(source: #/address)"));
    assert!(prompt.contains("User: Where is it?"));
    assert!(prompt.contains("Assistant: On Main Street."));
    assert!(prompt.contains("Question: When does it open?"));

    // Passages appear in rank order.
    let first = prompt.find("#/hours").expect("first source");
    let second = prompt.find("#/address").expect("second source");
    assert!(first < second);
}

#[test]
fn prompt_omits_history_section_when_empty() {
    let hits = vec![hit("1", "#/a", "Some text.", 0.5)];

    let prompt = compose_prompt("A question?", &hits, &[]);

    assert!(!prompt.contains("Conversation so far"));
}

#[test]
fn citations_are_unique_in_rank_order() {
    let hits = vec![
        hit("1", "#/hours", "Opening hours.", 0.9),
        hit("2", "#/address", "Address.", 0.8),
        hit("3", "#/hours", "More hours detail.", 0.7),
    ];

    assert_eq!(citations_for(&hits), vec!["#/hours", "#/address"]);
}

#[test]
fn generate_returns_answer_with_citations() {
    let calls = Arc::new(AtomicUsize::new(0));
    let generator = AnswerGenerator::new(Box::new(CannedBackend {
        answer: "The office opens at nine.".to_string(),
        calls: Arc::clone(&calls),
    }));
    let hits = vec![hit("1", "#/hours", "The office opens at nine.", 0.9)];

    let generated = generator
        .generate("When does it open?", &hits, &[])
        .expect("generate");

    assert_eq!(generated.answer, "The office opens at nine.");
    assert_eq!(generated.citations, vec!["#/hours"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn empty_retrieval_declines_without_backend_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let generator = AnswerGenerator::new(Box::new(CannedBackend {
        answer: "should never be used".to_string(),
        calls: Arc::clone(&calls),
    }));

    let generated = generator.generate("Anything?", &[], &[]).expect("generate");

    assert!(generated.answer.contains("don't have enough information"));
    assert!(generated.citations.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn backend_failure_propagates() {
    let generator = AnswerGenerator::new(Box::new(FailingBackend));
    let hits = vec![hit("1", "#/a", "Text.", 0.5)];

    let err = generator
        .generate("A question?", &hits, &[])
        .expect_err("backend failure should propagate");

    assert!(matches!(err, crate::RagError::GenerationTimeout(_)));
}
