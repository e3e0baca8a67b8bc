//! Conversation session state machine.
//!
//! DESIGN
//! ======
//! A session is `Idle` or `AwaitingResponse { turn }`. `begin_turn` performs
//! the synchronous half of a submit (append visitor message, clear input,
//! enter `AwaitingResponse`, snapshot history) and hands back a
//! `PendingTurn`. `settle` performs the other half (append exactly one
//! assistant message, return to `Idle`). The async driver in
//! `services::chat` sits between the two and never holds the session lock
//! across the generation call.
//!
//! INVARIANTS
//! ==========
//! - The log is append-only and starts with one assistant greeting.
//! - At most one turn is pending; `begin_turn` rejects while awaiting.
//! - Every accepted visitor message is followed by exactly one assistant
//!   message before the next visitor message.

use serde::Serialize;
use uuid::Uuid;

use super::message::Message;
use super::persona;
use crate::llm::types::{GenerateRequest, LlmError, Turn};

/// Monotonic per-session turn counter.
pub type TurnId = u64;

/// Explicit request phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    AwaitingResponse { turn: TurnId },
}

/// Why a submit was a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejection {
    #[error("input is empty")]
    EmptyInput,
    #[error("a reply is still pending")]
    AwaitingResponse,
    #[error("turn already settled")]
    Superseded,
}

impl SubmitRejection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::AwaitingResponse => "awaiting_response",
            Self::Superseded => "superseded",
        }
    }
}

/// How a submit ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The service answered with usable text.
    Replied(Message),
    /// A fixed fallback literal was appended (failure or blank reply).
    Fallback(Message),
    /// Nothing happened.
    Ignored(SubmitRejection),
}

impl SubmitOutcome {
    /// The assistant message appended by this submit, if any.
    #[must_use]
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Replied(m) | Self::Fallback(m) => Some(m),
            Self::Ignored(_) => None,
        }
    }
}

/// The in-flight half of a submit: what to send, and which turn to settle.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTurn {
    pub id: TurnId,
    /// Every message logged before the visitor message, in order.
    pub history: Vec<Turn>,
    /// Trimmed visitor text.
    pub prompt: String,
}

impl PendingTurn {
    /// Build the generation request with the fixed persona and temperature.
    #[must_use]
    pub fn to_request(&self, max_tokens: u32) -> GenerateRequest {
        GenerateRequest {
            system: persona::system_instruction(),
            history: self.history.clone(),
            prompt: self.prompt.clone(),
            temperature: persona::TEMPERATURE,
            max_tokens,
        }
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub messages: Vec<Message>,
    pub is_panel_open: bool,
    pub is_awaiting_response: bool,
    pub pending_input: String,
}

/// One widget's conversation: log, input buffer, panel flag and phase.
#[derive(Debug)]
pub struct ChatSession {
    log: Vec<Message>,
    pending_input: String,
    panel_open: bool,
    phase: Phase,
    next_turn: TurnId,
}

impl ChatSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: vec![Message::assistant(persona::GREETING)],
            pending_input: String::new(),
            panel_open: false,
            phase: Phase::Idle,
            next_turn: 1,
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.log
    }

    #[must_use]
    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    #[must_use]
    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    #[cfg(test)]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_awaiting_response(&self) -> bool {
        matches!(self.phase, Phase::AwaitingResponse { .. })
    }

    /// Flip the panel flag and return the new value. View state only.
    pub fn toggle_panel(&mut self) -> bool {
        self.panel_open = !self.panel_open;
        self.panel_open
    }

    pub fn update_pending_input(&mut self, text: impl Into<String>) {
        self.pending_input = text.into();
    }

    /// Accept a visitor message and enter `AwaitingResponse`.
    ///
    /// # Errors
    ///
    /// Returns a [`SubmitRejection`] and leaves the session untouched when
    /// the trimmed text is empty or a reply is still pending.
    pub fn begin_turn(&mut self, text: &str) -> Result<PendingTurn, SubmitRejection> {
        let prompt = text.trim();
        if prompt.is_empty() {
            return Err(SubmitRejection::EmptyInput);
        }
        if self.is_awaiting_response() {
            return Err(SubmitRejection::AwaitingResponse);
        }

        self.log.push(Message::visitor(prompt));
        self.pending_input.clear();
        let id = self.next_turn;
        self.next_turn += 1;
        self.phase = Phase::AwaitingResponse { turn: id };

        let prior = &self.log[..self.log.len() - 1];
        let history = prior.iter().map(Message::to_turn).collect();
        Ok(PendingTurn { id, history, prompt: prompt.to_string() })
    }

    /// Append the outcome of `turn` and return to `Idle`.
    ///
    /// Blank replies become [`persona::BLANK_REPLY`]; any error becomes
    /// [`persona::SERVICE_FAILURE_REPLY`]. Returns `None` without touching
    /// the log when `turn` is not the pending turn.
    pub fn settle(&mut self, turn: TurnId, reply: Result<String, LlmError>) -> Option<SubmitOutcome> {
        if self.phase != (Phase::AwaitingResponse { turn }) {
            return None;
        }

        let outcome = match reply {
            Ok(text) if text.trim().is_empty() => SubmitOutcome::Fallback(Message::assistant(persona::BLANK_REPLY)),
            Ok(text) => SubmitOutcome::Replied(Message::assistant(text)),
            Err(_) => SubmitOutcome::Fallback(Message::assistant(persona::SERVICE_FAILURE_REPLY)),
        };
        if let Some(message) = outcome.message() {
            self.log.push(message.clone());
        }
        self.phase = Phase::Idle;
        Some(outcome)
    }

    #[must_use]
    pub fn snapshot(&self, id: Uuid) -> SessionSnapshot {
        SessionSnapshot {
            id,
            messages: self.log.clone(),
            is_panel_open: self.is_panel_open(),
            is_awaiting_response: self.is_awaiting_response(),
            pending_input: self.pending_input.clone(),
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
