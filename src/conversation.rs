//! The per-channel append-only conversation log and its per-agent watermarks.

use crate::clock::Clock;
use crate::types::{AccountId, Author};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One entry in the shared log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub author: Author,
    pub content: String,
    pub index: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Sentinel watermark value meaning "has seen nothing yet".
pub const UNSEEN: i64 = -1;

/// Append-only indexed sequence of messages with per-agent visibility watermarks.
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<ConversationMessage>,
    watermarks: HashMap<AccountId, i64>,
    next_index: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every message and watermark, ready for a fresh conversation.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.watermarks.clear();
        self.next_index = 0;
    }

    /// Appends a message, assigning it the next index. If the author is an agent, that agent's
    /// watermark is advanced to the new message's index (an agent always sees its own message).
    pub fn append(&mut self, clock: &dyn Clock, author: Author, content: impl Into<String>) -> &ConversationMessage {
        let index = self.next_index;
        self.next_index += 1;
        let message = ConversationMessage {
            author: author.clone(),
            content: content.into(),
            index,
            recorded_at: clock.now(),
        };
        if let Author::Agent(account_id) = &author {
            self.watermarks.insert(account_id.clone(), index as i64);
        }
        self.messages.push(message);
        self.messages.last().expect("message was just pushed")
    }

    /// The highest index assigned so far, or `UNSEEN` if the log is empty.
    pub fn tail_index(&self) -> i64 {
        self.messages.last().map(|m| m.index as i64).unwrap_or(UNSEEN)
    }

    /// `account_id`'s watermark, or `UNSEEN` if it has never been recorded.
    pub fn watermark_for(&self, account_id: &AccountId) -> i64 {
        self.watermarks.get(account_id).copied().unwrap_or(UNSEEN)
    }

    /// Explicitly sets `account_id`'s watermark. Used by the executor both to advance it ahead
    /// of invoking an agent (so the agent's own forthcoming reply is not re-delivered to it) and
    /// to bring it current after an agent's reply is appended.
    pub fn set_watermark(&mut self, account_id: &AccountId, value: i64) {
        self.watermarks.insert(account_id.clone(), value);
    }

    /// Every message whose index is greater than `since` and whose author is not `Human`,
    /// rendered as `"[{agent_id}]: {content}"` in log order.
    pub fn accumulated_since(&self, since: i64) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.index as i64 > since)
            .filter_map(|m| match &m.author {
                Author::Human => None,
                Author::Agent(id) => Some(format!("[{id}]: {}", m.content)),
            })
            .collect()
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }
}
