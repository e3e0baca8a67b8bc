use super::*;
use std::sync::Arc;

use crate::conversation::persona;
use crate::llm::TextGenerator;
use crate::llm::types::{GenerateRequest, Generation, LlmError};
use crate::state::test_helpers;

struct EchoLlm;

#[async_trait::async_trait]
impl TextGenerator for EchoLlm {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, LlmError> {
        Ok(Generation {
            text: format!("You said: {}", request.prompt),
            model: "echo".into(),
            finish_reason: "STOP".into(),
            input_tokens: 0,
            output_tokens: 0,
        })
    }
}

fn body(text: &str) -> Json<SubmitBody> {
    Json(SubmitBody { text: Some(text.into()) })
}

#[test]
fn chat_error_maps_status() {
    assert_eq!(chat_error_to_api(&ChatError::NotFound(Uuid::nil())).status, StatusCode::NOT_FOUND);
    assert_eq!(
        chat_error_to_api(&ChatError::CapacityReached { max: 1 }).status,
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn create_session_returns_greeting_snapshot() {
    let state = test_helpers::test_app_state();
    let (status, Json(snapshot)) = create_session(State(state.clone())).await.unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(snapshot.messages[0].text(), persona::GREETING);
    assert!(!snapshot.is_panel_open);
    assert!(!snapshot.is_awaiting_response);
    assert_eq!(state.session_count().await, 1);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let state = test_helpers::test_app_state();
    let err = get_session(State(state.clone()), Path(Uuid::new_v4())).await.unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.body.code, "E_SESSION_NOT_FOUND");

    let err = submit(State(state), Path(Uuid::new_v4()), body("hi")).await.unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submit_replies_and_returns_session() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(EchoLlm));
    let handle = test_helpers::seed_session(&state).await;

    let Json(response) = submit(State(state), Path(handle.id()), body("  big oak  ")).await.unwrap();

    assert_eq!(response.outcome, "replied");
    assert_eq!(response.message.as_ref().map(Message::text), Some("You said: big oak"));
    assert!(response.reason.is_none());
    assert_eq!(response.session.messages.len(), 3);
    assert!(!response.session.is_awaiting_response);
}

#[tokio::test]
async fn submit_without_llm_reports_fallback() {
    let state = test_helpers::test_app_state();
    let handle = test_helpers::seed_session(&state).await;

    let Json(response) = submit(State(state), Path(handle.id()), body("rates?")).await.unwrap();

    assert_eq!(response.outcome, "fallback");
    assert_eq!(response.message.as_ref().map(Message::text), Some(persona::SERVICE_FAILURE_REPLY));
}

#[tokio::test]
async fn blank_submit_is_ignored_with_reason() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(EchoLlm));
    let handle = test_helpers::seed_session(&state).await;

    let Json(response) = submit(State(state), Path(handle.id()), body("   ")).await.unwrap();

    assert_eq!(response.outcome, "ignored");
    assert_eq!(response.reason, Some("empty_input"));
    assert!(response.message.is_none());
    assert_eq!(response.session.messages.len(), 1);
}

#[tokio::test]
async fn submit_without_text_uses_pending_input() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(EchoLlm));
    let handle = test_helpers::seed_session(&state).await;

    let Json(typed) = update_input(
        State(state.clone()),
        Path(handle.id()),
        Json(UpdateInputBody { text: "stump grinding".into() }),
    )
    .await
    .unwrap();
    assert_eq!(typed.pending_input, "stump grinding");
    assert_eq!(typed.messages.len(), 1);
    let Json(response) = submit(State(state), Path(handle.id()), Json(SubmitBody::default())).await.unwrap();

    assert_eq!(response.outcome, "replied");
    assert_eq!(response.message.as_ref().map(Message::text), Some("You said: stump grinding"));
    assert!(response.session.pending_input.is_empty());
}

#[tokio::test]
async fn toggle_panel_flips_without_messages() {
    let state = test_helpers::test_app_state();
    let handle = test_helpers::seed_session(&state).await;

    let Json(open) = toggle_panel(State(state.clone()), Path(handle.id())).await.unwrap();
    assert!(open.is_panel_open);
    let Json(closed) = toggle_panel(State(state), Path(handle.id())).await.unwrap();
    assert!(!closed.is_panel_open);
    assert_eq!(closed.messages.len(), 1);
}

#[tokio::test]
async fn end_session_then_lookup_fails() {
    let state = test_helpers::test_app_state();
    let handle = test_helpers::seed_session(&state).await;

    let status = end_session(State(state.clone()), Path(handle.id())).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    let err = end_session(State(state), Path(handle.id())).await.unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

#[test]
fn ignored_response_serializes_reason_not_message() {
    let session = crate::conversation::ChatSession::new().snapshot(Uuid::nil());
    let response = SubmitResponse::new(
        SubmitOutcome::Ignored(SubmitRejection::AwaitingResponse),
        session,
    );
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["outcome"], "ignored");
    assert_eq!(json["reason"], "awaiting_response");
    assert!(json.get("message").is_none());
    assert_eq!(json["session"]["messages"][0]["role"], "assistant");
}

#[test]
fn settled_fallback_reports_trailing_assistant_message() {
    let log = vec![
        Message::assistant(persona::GREETING),
        Message::visitor("hello"),
        Message::assistant(persona::SERVICE_FAILURE_REPLY),
    ];
    let outcome = settled_fallback(&log);
    assert_eq!(outcome.message().map(Message::text), Some(persona::SERVICE_FAILURE_REPLY));
    assert!(matches!(outcome, SubmitOutcome::Fallback(_)));
}

#[test]
fn settled_fallback_ignores_unanswered_visitor_message() {
    let log = vec![Message::assistant(persona::GREETING), Message::visitor("hello")];
    assert_eq!(settled_fallback(&log), SubmitOutcome::Ignored(SubmitRejection::Superseded));
    assert_eq!(settled_fallback(&[]), SubmitOutcome::Ignored(SubmitRejection::Superseded));
}
