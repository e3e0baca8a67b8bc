//! Conversation log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::llm::types::{Turn, TurnRole};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Visitor,
    Assistant,
}

impl Role {
    /// Provider-neutral turn role used when replaying history.
    #[must_use]
    pub fn turn_role(self) -> TurnRole {
        match self {
            Self::Visitor => TurnRole::User,
            Self::Assistant => TurnRole::Assistant,
        }
    }
}

/// One entry of the conversation log. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    role: Role,
    text: String,
    /// Milliseconds since Unix epoch. Display and ordering only.
    created_at: i64,
}

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Message {
    fn new(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        debug_assert!(!text.trim().is_empty(), "messages carry display text");
        Self { role, text, created_at: now_ms() }
    }

    pub(crate) fn visitor(text: impl Into<String>) -> Self {
        Self::new(Role::Visitor, text)
    }

    pub(crate) fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[cfg(test)]
    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Replay this message as one history turn.
    #[must_use]
    pub fn to_turn(&self) -> Turn {
        Turn { role: self.role.turn_role(), text: self.text.clone() }
    }
}
