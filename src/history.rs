use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::reader::excerpt;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationExchange {
    pub user_text: String,
    pub model_text: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded FIFO of completed exchanges. Appending past capacity evicts the
/// oldest entry.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<ConversationExchange>,
    capacity: usize,
}

impl ConversationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, exchange: ConversationExchange) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(exchange);
    }

    pub fn record(&mut self, user_text: impl Into<String>, model_text: impl Into<String>) {
        self.push(ConversationExchange {
            user_text: user_text.into(),
            model_text: model_text.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConversationExchange> {
        self.entries.iter()
    }

    /// The last `count` exchanges, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ConversationExchange> {
        self.entries.iter().skip(self.entries.len().saturating_sub(count))
    }

    /// Prompt block for the last `count` exchanges, model replies cut to
    /// `reply_chars` characters:
    ///
    /// ```text
    /// User: <text>
    /// AI: <first reply_chars chars>...
    /// ```
    pub fn render_recent(&self, count: usize, reply_chars: usize) -> String {
        self.recent(count)
            .map(|e| format!("User: {}\nAI: {}...", e.user_text, excerpt(&e.model_text, reply_chars)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eleventh_append_evicts_the_first() {
        let mut h = ConversationHistory::new(10);
        for i in 1..=11 {
            h.record(format!("q{i}"), format!("a{i}"));
        }
        assert_eq!(h.len(), 10);
        let users: Vec<&str> = h.iter().map(|e| e.user_text.as_str()).collect();
        assert_eq!(users.first(), Some(&"q2"));
        assert_eq!(users.last(), Some(&"q11"));
        assert!(users.windows(2).all(|w| w[0][1..].parse::<u32>().unwrap() < w[1][1..].parse::<u32>().unwrap()));
    }

    #[test]
    fn render_uses_last_three_with_trimmed_replies() {
        let mut h = ConversationHistory::new(10);
        h.record("first", "old");
        h.record("second", "x".repeat(500));
        h.record("third", "short");
        h.record("fourth", "done");

        let block = h.render_recent(3, 200);
        assert!(!block.contains("first"));
        assert!(block.starts_with("User: second\nAI: "));
        assert!(block.contains(&format!("AI: {}...\n", "x".repeat(200))));
        assert!(block.ends_with("User: fourth\nAI: done..."));
    }

    #[test]
    fn empty_history_renders_nothing() {
        let h = ConversationHistory::new(10);
        assert!(h.is_empty());
        assert_eq!(h.render_recent(3, 200), "");
    }
}
