
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

/// One completed question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub query: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

impl ConversationTurn {
    #[inline]
    pub fn new(query: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }
}

/// Bounded, append-only dialogue history for a single session.
///
/// Insertion order is chronological order. When the window is full, the
/// oldest turn is evicted on append. Purely in-memory; nothing survives a
/// process restart.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationMemory {
    /// Create a memory bounded to the most recent `capacity` turns.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a turn, evicting the oldest when the window is full.
    #[inline]
    pub fn append(&mut self, turn: ConversationTurn) {
        if self.capacity == 0 {
            return;
        }
        if self.turns.len() == self.capacity {
            let evicted = self.turns.pop_front();
            debug!(
                "Conversation window full, evicted oldest turn: {:?}",
                evicted.map(|t| t.query)
            );
        }
        self.turns.push_back(turn);
    }

    /// The most recent `n` turns in chronological order.
    #[inline]
    pub fn recent(&self, n: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
