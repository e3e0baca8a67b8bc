//! Chat service — session registry and the async half of a submit.
//!
//! DESIGN
//! ======
//! `submit` runs `begin_turn` under the session lock, releases it, makes
//! exactly one generation call, then settles under the lock again. A
//! `SettleGuard` owns the pending turn in between: if the future is dropped
//! or unwinds before settling, the guard appends the failure fallback and
//! returns the session to `Idle`. Panics inside the generator are caught and
//! treated as failures.
//!
//! ERROR HANDLING
//! ==============
//! Nothing from the generation path reaches the caller as an error. Every
//! failure is logged with its code and collapses into the one fallback
//! message the visitor sees.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::conversation::session::{PendingTurn, TurnId};
use crate::conversation::{ChatSession, SessionSnapshot, SubmitOutcome, SubmitRejection};
use crate::llm::types::LlmError;
use crate::routes::ErrorCode;
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("session not found: {0}")]
    NotFound(Uuid),
    #[error("session capacity reached ({max} live sessions)")]
    CapacityReached { max: usize },
}

impl ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_SESSION_NOT_FOUND",
            Self::CapacityReached { .. } => "E_SESSION_CAPACITY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::CapacityReached { .. })
    }
}

struct Slot {
    session: ChatSession,
    last_activity: Instant,
}

/// Shared handle to one live session. Cloning is cheap.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    inner: Arc<Mutex<Slot>>,
}

impl SessionHandle {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            inner: Arc::new(Mutex::new(Slot { session: ChatSession::new(), last_activity: Instant::now() })),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the session and mark it active. Never hold the
    /// returned data across an `.await` that needs the lock again.
    pub fn with<R>(&self, f: impl FnOnce(&mut ChatSession) -> R) -> R {
        let mut slot = self.lock();
        slot.last_activity = Instant::now();
        f(&mut slot.session)
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.with(|s| s.snapshot(self.id))
    }

    pub fn toggle_panel(&self) -> bool {
        self.with(ChatSession::toggle_panel)
    }

    pub fn update_pending_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.with(|s| s.update_pending_input(text));
    }

    /// Idle past `ttl` at `now` and not waiting on a reply.
    #[must_use]
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        let slot = self.lock();
        !slot.session.is_awaiting_response() && now.saturating_duration_since(slot.last_activity) > ttl
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Register a fresh session (one per widget mount).
///
/// # Errors
///
/// Returns [`ChatError::CapacityReached`] when the live-session cap is hit.
pub async fn create_session(state: &AppState) -> Result<SessionHandle, ChatError> {
    let mut sessions = state.sessions.write().await;
    let max = state.session_config.max_count;
    if sessions.len() >= max {
        warn!(live = sessions.len(), max, "chat: session capacity reached");
        return Err(ChatError::CapacityReached { max });
    }
    let handle = SessionHandle::new(Uuid::new_v4());
    sessions.insert(handle.id(), handle.clone());
    info!(session_id = %handle.id(), live = sessions.len(), "chat: session created");
    Ok(handle)
}

/// Look up a live session.
///
/// # Errors
///
/// Returns [`ChatError::NotFound`] for unknown or swept ids.
pub async fn get_session(state: &AppState, session_id: Uuid) -> Result<SessionHandle, ChatError> {
    let sessions = state.sessions.read().await;
    sessions
        .get(&session_id)
        .cloned()
        .ok_or(ChatError::NotFound(session_id))
}

/// Forget a session (page unload). An in-flight turn still settles on its
/// own handle; it just is no longer reachable.
///
/// # Errors
///
/// Returns [`ChatError::NotFound`] for unknown ids.
pub async fn end_session(state: &AppState, session_id: Uuid) -> Result<(), ChatError> {
    let removed = state.sessions.write().await.remove(&session_id);
    if removed.is_none() {
        return Err(ChatError::NotFound(session_id));
    }
    state.rate_limiter.forget(session_id);
    info!(%session_id, "chat: session ended");
    Ok(())
}

/// Remove sessions that are expired at `now`. Returns the removed ids.
pub fn sweep_idle(sessions: &mut HashMap<Uuid, SessionHandle>, now: Instant, ttl: Duration) -> Vec<Uuid> {
    let expired: Vec<Uuid> = sessions
        .iter()
        .filter(|(_, handle)| handle.is_expired(now, ttl))
        .map(|(id, _)| *id)
        .collect();
    for id in &expired {
        sessions.remove(id);
    }
    expired
}

// =============================================================================
// SUBMIT
// =============================================================================

/// Settles the pending turn exactly once: explicitly via `settle`, or with
/// the failure fallback on drop.
struct SettleGuard {
    handle: SessionHandle,
    turn: Option<TurnId>,
}

impl SettleGuard {
    fn new(handle: SessionHandle, turn: TurnId) -> Self {
        Self { handle, turn: Some(turn) }
    }

    fn settle(mut self, reply: Result<String, LlmError>) -> SubmitOutcome {
        let session_id = self.handle.id();
        let outcome = self
            .turn
            .take()
            .and_then(|turn| self.handle.with(|s| s.settle(turn, reply)));
        outcome.unwrap_or_else(|| {
            error!(%session_id, "chat: pending turn was already settled");
            SubmitOutcome::Ignored(SubmitRejection::Superseded)
        })
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        if let Some(turn) = self.turn.take() {
            warn!(session_id = %self.handle.id(), turn, "chat: turn abandoned before settling, using fallback");
            let reason = LlmError::Aborted("turn dropped before settling".into());
            self.handle.with(|s| s.settle(turn, Err(reason)));
        }
    }
}

/// Submit visitor text to a session and wait for its single assistant reply.
///
/// Never fails: rejected input comes back as [`SubmitOutcome::Ignored`],
/// and every generation failure as [`SubmitOutcome::Fallback`].
pub async fn submit(state: &AppState, handle: &SessionHandle, text: &str) -> SubmitOutcome {
    let session_id = handle.id();
    let pending = match handle.with(|s| s.begin_turn(text)) {
        Ok(pending) => pending,
        Err(rejection) => {
            debug!(%session_id, reason = rejection.as_str(), "chat: submit ignored");
            return SubmitOutcome::Ignored(rejection);
        }
    };

    info!(
        %session_id,
        turn = pending.id,
        history = pending.history.len(),
        prompt_len = pending.prompt.len(),
        "chat: turn dispatched"
    );
    let guard = SettleGuard::new(handle.clone(), pending.id);

    let reply = generate_reply(state, session_id, &pending).await;
    if let Err(e) = &reply {
        warn!(%session_id, turn = pending.id, code = e.error_code(), error = %e, "chat: generation failed, using fallback");
    }

    let outcome = guard.settle(reply);
    info!(
        %session_id,
        turn = pending.id,
        fallback = matches!(outcome, SubmitOutcome::Fallback(_)),
        reply_len = outcome.message().map_or(0, |m| m.text().len()),
        "chat: turn settled"
    );
    outcome
}

/// One generation attempt. No retries.
async fn generate_reply(state: &AppState, session_id: Uuid, pending: &PendingTurn) -> Result<String, LlmError> {
    let Some(llm) = state.llm.as_ref() else {
        return Err(LlmError::NotConfigured);
    };
    state
        .rate_limiter
        .check_and_record(session_id)
        .map_err(|e| LlmError::RateLimited(e.to_string()))?;

    let request = pending.to_request(state.max_tokens);
    let generation = AssertUnwindSafe(llm.generate(&request))
        .catch_unwind()
        .await
        .map_err(|_| LlmError::Aborted("generator panicked".into()))??;

    info!(
        %session_id,
        turn = pending.id,
        model = %generation.model,
        finish_reason = %generation.finish_reason,
        input_tokens = generation.input_tokens,
        output_tokens = generation.output_tokens,
        "chat: LLM response"
    );
    Ok(generation.text)
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
