//! Conversation history
//!
//! Turns exchanged between the client and the relay, and the sliding-window
//! trim applied before a history is forwarded upstream.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::config::TurnLimits;
use crate::utils::truncate_chars;

/// Role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    fn truncated(mut self, max_chars: usize) -> Self {
        let cut = match truncate_chars(&self.content, max_chars) {
            Cow::Owned(cut) => Some(cut),
            Cow::Borrowed(_) => None,
        };
        if let Some(cut) = cut {
            self.content = cut;
        }
        self
    }
}

/// Build the turn sequence sent upstream: the most recent `max_history`
/// turns of `history` followed by `message` as a user turn, every entry
/// capped at `max_message_chars`.
pub fn bounded_turns(message: &str, history: Vec<Turn>, limits: &TurnLimits) -> Vec<Turn> {
    let skip = history.len().saturating_sub(limits.max_history);

    let mut turns: Vec<Turn> = history
        .into_iter()
        .skip(skip)
        .map(|turn| turn.truncated(limits.max_message_chars))
        .collect();

    turns.push(Turn::user(message).truncated(limits.max_message_chars));
    turns
}
