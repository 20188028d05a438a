//! Ordered chat history for one session.
//!
//! Turns are append-only. The single exception is the assistant turn opened by
//! [`Transcript::begin_exchange`], which is mutated through the [`TurnHandle`]
//! returned at that moment and never located by position afterwards.

use serde::{Deserialize, Serialize};

use crate::api::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Handle to the assistant turn opened for one exchange.
///
/// Not `Clone`: exactly one writer owns it for the lifetime of the exchange.
#[derive(Debug, PartialEq, Eq)]
pub struct TurnHandle {
    index: usize,
    generation: u64,
}

impl TurnHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Default, Clone)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
    // Bumped by clear() so handles from a previous session go stale.
    generation: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Push the user turn and its empty assistant partner.
    pub fn begin_exchange(&mut self, prompt: impl Into<String>) -> TurnHandle {
        self.turns.push(ChatTurn {
            role: Role::User,
            content: prompt.into(),
        });
        self.turns.push(ChatTurn {
            role: Role::Assistant,
            content: String::new(),
        });
        TurnHandle {
            index: self.turns.len() - 1,
            generation: self.generation,
        }
    }

    fn turn_mut(&mut self, handle: &TurnHandle) -> Option<&mut ChatTurn> {
        if handle.generation != self.generation {
            return None;
        }
        self.turns.get_mut(handle.index)
    }

    pub fn get(&self, handle: &TurnHandle) -> Option<&ChatTurn> {
        if handle.generation != self.generation {
            return None;
        }
        self.turns.get(handle.index)
    }

    /// Append a stream fragment. Returns false for a stale handle.
    pub fn append(&mut self, handle: &TurnHandle, fragment: &str) -> bool {
        match self.turn_mut(handle) {
            Some(turn) => {
                turn.content.push_str(fragment);
                true
            }
            None => false,
        }
    }

    /// Replace the turn's content wholesale.
    pub fn overwrite(&mut self, handle: &TurnHandle, content: impl Into<String>) -> bool {
        match self.turn_mut(handle) {
            Some(turn) => {
                turn.content = content.into();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.generation += 1;
    }

    /// History to send with the next request.
    ///
    /// `pending` is the turn being filled by the current exchange; it is left
    /// out so the server never sees an empty assistant message.
    pub fn messages(&self, pending: Option<&TurnHandle>) -> Vec<ChatMessage> {
        let skip = pending
            .filter(|h| h.generation == self.generation)
            .map(|h| h.index);
        self.turns
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != skip)
            .map(|(_, t)| ChatMessage {
                role: t.role,
                content: t.content.clone(),
            })
            .collect()
    }
}
