use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::gemini::Role;
use crate::relay::HistoryTurn;

/// Identity of one exchange. Minted in increasing order and never
/// reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    // Set on the response placeholder of an exchange
    exchange: Option<RequestId>,
}

impl ChatTurn {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            exchange: None,
        }
    }

    fn placeholder(id: RequestId) -> Self {
        Self {
            exchange: Some(id),
            ..Self::new(Role::Model, "")
        }
    }
}

/// Ordered turns of the session plus a side table locating each
/// exchange's response slot.
///
/// The side table is rebuilt from the turns after every mutation, so a
/// lookup never goes through a position that has since shifted.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
    slots: HashMap<RequestId, usize>,
}

impl Transcript {
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Appends the user's message and an empty response slot for `id`.
    pub fn push_exchange(&mut self, id: RequestId, message: &str) {
        self.turns.push(ChatTurn::new(Role::User, message));
        self.turns.push(ChatTurn::placeholder(id));
        self.reindex();
    }

    /// Current position of the response slot for `id`.
    pub fn position(&self, id: RequestId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    pub fn slot(&self, id: RequestId) -> Option<&ChatTurn> {
        self.position(id).and_then(|i| self.turns.get(i))
    }

    fn slot_mut(&mut self, id: RequestId) -> Option<&mut ChatTurn> {
        let index = self.position(id)?;
        self.turns.get_mut(index)
    }

    /// Appends text to the response slot. Returns false when the slot
    /// no longer exists.
    pub fn append(&mut self, id: RequestId, text: &str) -> bool {
        match self.slot_mut(id) {
            Some(turn) => {
                turn.content.push_str(text);
                true
            }
            None => false,
        }
    }

    /// Replaces the content of the response slot.
    pub fn replace(&mut self, id: RequestId, content: String) -> bool {
        match self.slot_mut(id) {
            Some(turn) => {
                turn.content = content;
                true
            }
            None => false,
        }
    }

    /// Turns to send along with a new message. Empty turns are skipped.
    pub fn history(&self) -> Vec<HistoryTurn> {
        self.turns
            .iter()
            .filter(|turn| !turn.content.is_empty())
            .map(|turn| HistoryTurn::new(turn.role, &turn.content))
            .collect()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.reindex();
    }

    fn reindex(&mut self) {
        self.slots = self
            .turns
            .iter()
            .enumerate()
            .filter_map(|(i, turn)| turn.exchange.map(|id| (id, i)))
            .collect();
    }
}
