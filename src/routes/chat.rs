//! Chat widget routes — one session per mounted widget.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::conversation::message::Role;
use crate::conversation::{Message, SessionSnapshot, SubmitOutcome, SubmitRejection};
use crate::routes::ApiError;
use crate::services::chat::{self, ChatError};
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct SubmitBody {
    /// Text to send. Falls back to the session's pending input when absent.
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateInputBody {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// `replied`, `fallback` or `ignored`.
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    pub session: SessionSnapshot,
}

impl SubmitResponse {
    fn new(outcome: SubmitOutcome, session: SessionSnapshot) -> Self {
        match outcome {
            SubmitOutcome::Replied(message) => {
                Self { outcome: "replied", message: Some(message), reason: None, session }
            }
            SubmitOutcome::Fallback(message) => {
                Self { outcome: "fallback", message: Some(message), reason: None, session }
            }
            SubmitOutcome::Ignored(rejection) => {
                Self { outcome: "ignored", message: None, reason: Some(rejection.as_str()), session }
            }
        }
    }
}

/// Outcome reported when the submit task died: the trailing assistant
/// message its settle guard left behind, if any.
fn settled_fallback(log: &[Message]) -> SubmitOutcome {
    log.last()
        .filter(|m| m.role() == Role::Assistant)
        .cloned()
        .map_or(SubmitOutcome::Ignored(SubmitRejection::Superseded), SubmitOutcome::Fallback)
}

pub(crate) fn chat_error_to_api(err: &ChatError) -> ApiError {
    match err {
        ChatError::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, err),
        ChatError::CapacityReached { .. } => ApiError::new(StatusCode::SERVICE_UNAVAILABLE, err),
    }
}

/// `POST /api/chat/sessions` — mount a widget.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let handle = chat::create_session(&state)
        .await
        .map_err(|e| chat_error_to_api(&e))?;
    Ok((StatusCode::CREATED, Json(handle.snapshot())))
}

/// `GET /api/chat/sessions/:id` — current widget state.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let handle = chat::get_session(&state, session_id)
        .await
        .map_err(|e| chat_error_to_api(&e))?;
    Ok(Json(handle.snapshot()))
}

/// `DELETE /api/chat/sessions/:id` — page unload.
pub async fn end_session(State(state): State<AppState>, Path(session_id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    chat::end_session(&state, session_id)
        .await
        .map_err(|e| chat_error_to_api(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/chat/sessions/:id/messages` — submit visitor text.
///
/// The turn runs on its own task so a disconnecting browser cannot cancel it
/// halfway; the reply lands in the session either way.
pub async fn submit(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<SubmitBody>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let handle = chat::get_session(&state, session_id)
        .await
        .map_err(|e| chat_error_to_api(&e))?;
    let text = match body.text {
        Some(text) => text,
        None => handle.with(|s| s.pending_input().to_string()),
    };

    let task = tokio::spawn({
        let state = state.clone();
        let handle = handle.clone();
        async move { chat::submit(&state, &handle, &text).await }
    });
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            // The settle guard already appended the fallback while unwinding.
            error!(%session_id, error = %e, "chat: submit task failed");
            settled_fallback(&handle.with(|s| s.messages().to_vec()))
        }
    };

    Ok(Json(SubmitResponse::new(outcome, handle.snapshot())))
}

/// `PUT /api/chat/sessions/:id/input` — mirror the text box.
pub async fn update_input(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<UpdateInputBody>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let handle = chat::get_session(&state, session_id)
        .await
        .map_err(|e| chat_error_to_api(&e))?;
    handle.update_pending_input(body.text);
    Ok(Json(handle.snapshot()))
}

/// `POST /api/chat/sessions/:id/panel` — open or close the panel.
pub async fn toggle_panel(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let handle = chat::get_session(&state, session_id)
        .await
        .map_err(|e| chat_error_to_api(&e))?;
    handle.toggle_panel();
    Ok(Json(handle.snapshot()))
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
