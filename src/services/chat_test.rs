use super::*;
use crate::conversation::persona;
use crate::conversation::Message;
use crate::conversation::message::Role;
use crate::llm::TextGenerator;
use crate::llm::types::{GenerateRequest, Generation, Turn};
use crate::rate_limit::{RateLimitConfig, RateLimiter};
use crate::state::test_helpers;
use tokio::sync::Notify;
use tokio::time::timeout;

// =========================================================================
// Mock generators
// =========================================================================

fn generation(text: &str) -> Generation {
    Generation {
        text: text.into(),
        model: "mock".into(),
        finish_reason: "STOP".into(),
        input_tokens: 0,
        output_tokens: 0,
    }
}

/// Replays scripted results in order, then answers "done". Records requests.
struct ScriptedLlm {
    replies: Mutex<Vec<Result<Generation, LlmError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Result<Generation, LlmError>>) -> Self {
        Self { replies: Mutex::new(replies), requests: Mutex::new(Vec::new()) }
    }

    fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TextGenerator for ScriptedLlm {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() { Ok(generation("done")) } else { replies.remove(0) }
    }
}

struct FailingLlm;

#[async_trait::async_trait]
impl TextGenerator for FailingLlm {
    async fn generate(&self, _request: &GenerateRequest) -> Result<Generation, LlmError> {
        Err(LlmError::ApiResponse { status: 503, body: "unavailable".into() })
    }
}

struct PanickingLlm;

#[async_trait::async_trait]
impl TextGenerator for PanickingLlm {
    async fn generate(&self, _request: &GenerateRequest) -> Result<Generation, LlmError> {
        panic!("provider client bug");
    }
}

/// Signals `started` when called, then waits for `release`.
struct GatedLlm {
    started: Notify,
    release: Notify,
}

impl GatedLlm {
    fn new() -> Self {
        Self { started: Notify::new(), release: Notify::new() }
    }
}

#[async_trait::async_trait]
impl TextGenerator for GatedLlm {
    async fn generate(&self, _request: &GenerateRequest) -> Result<Generation, LlmError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(generation("Worth the wait."))
    }
}

fn texts(handle: &SessionHandle) -> Vec<(Role, String)> {
    handle
        .snapshot()
        .messages
        .iter()
        .map(|m: &Message| (m.role(), m.text().to_string()))
        .collect()
}

// =========================================================================
// submit: success paths
// =========================================================================

#[tokio::test]
async fn submit_appends_visitor_then_reply() {
    let llm = Arc::new(ScriptedLlm::new(vec![Ok(generation("Free quotes, always."))]));
    let state = test_helpers::test_app_state_with_llm(llm);
    let handle = test_helpers::seed_session(&state).await;

    let outcome = submit(&state, &handle, "Do you do quotes?").await;

    assert!(matches!(&outcome, SubmitOutcome::Replied(m) if m.text() == "Free quotes, always."));
    let log = texts(&handle);
    assert_eq!(log.len(), 3);
    assert_eq!(log[1], (Role::Visitor, "Do you do quotes?".to_string()));
    assert_eq!(log[2], (Role::Assistant, "Free quotes, always.".to_string()));
    assert!(!handle.snapshot().is_awaiting_response);
}

#[tokio::test]
async fn submit_sends_full_history_and_persona() {
    let llm = Arc::new(ScriptedLlm::new(vec![Ok(generation("Keith climbs.")), Ok(generation("Kevin runs the site."))]));
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let handle = test_helpers::seed_session(&state).await;

    submit(&state, &handle, "Who climbs?").await;
    submit(&state, &handle, "And Kevin?").await;

    let requests = llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].history, vec![Turn::assistant(persona::GREETING)]);
    assert_eq!(requests[0].prompt, "Who climbs?");

    let second = &requests[1];
    assert_eq!(
        second.history,
        vec![Turn::assistant(persona::GREETING), Turn::user("Who climbs?"), Turn::assistant("Keith climbs.")]
    );
    assert_eq!(second.prompt, "And Kevin?");
    assert_eq!(second.system, persona::system_instruction());
    assert!((second.temperature - persona::TEMPERATURE).abs() < f32::EPSILON);
    assert_eq!(second.max_tokens, state.max_tokens);
}

#[tokio::test]
async fn submit_blank_reply_uses_drawing_a_blank() {
    let llm = Arc::new(ScriptedLlm::new(vec![Ok(generation(""))]));
    let state = test_helpers::test_app_state_with_llm(llm);
    let handle = test_helpers::seed_session(&state).await;

    let outcome = submit(&state, &handle, "hello").await;

    assert!(matches!(&outcome, SubmitOutcome::Fallback(m) if m.text() == persona::BLANK_REPLY));
    assert_eq!(texts(&handle)[2].1, persona::BLANK_REPLY);
}

// =========================================================================
// submit: no-ops
// =========================================================================

#[tokio::test]
async fn submit_empty_is_ignored_without_calling_llm() {
    let llm = Arc::new(ScriptedLlm::new(vec![]));
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let handle = test_helpers::seed_session(&state).await;

    assert_eq!(submit(&state, &handle, "").await, SubmitOutcome::Ignored(SubmitRejection::EmptyInput));
    assert_eq!(submit(&state, &handle, "   ").await, SubmitOutcome::Ignored(SubmitRejection::EmptyInput));
    assert_eq!(handle.snapshot().messages.len(), 1);
    assert!(llm.requests().is_empty());
}

#[tokio::test]
async fn submit_while_awaiting_is_rejected() {
    let llm = Arc::new(GatedLlm::new());
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let handle = test_helpers::seed_session(&state).await;

    let first = tokio::spawn({
        let state = state.clone();
        let handle = handle.clone();
        async move { submit(&state, &handle, "first").await }
    });
    llm.started.notified().await;

    let snap = handle.snapshot();
    assert!(snap.is_awaiting_response);
    assert_eq!(snap.messages.len(), 2);

    let second = submit(&state, &handle, "second").await;
    assert_eq!(second, SubmitOutcome::Ignored(SubmitRejection::AwaitingResponse));
    assert_eq!(handle.snapshot().messages.len(), 2);

    llm.release.notify_one();
    let outcome = first.await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Replied(_)));
    assert_eq!(handle.snapshot().messages.len(), 3);
    assert!(!handle.snapshot().is_awaiting_response);
}

#[tokio::test]
async fn toggle_panel_during_turn_does_not_cancel() {
    let llm = Arc::new(GatedLlm::new());
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let handle = test_helpers::seed_session(&state).await;

    let task = tokio::spawn({
        let state = state.clone();
        let handle = handle.clone();
        async move { submit(&state, &handle, "still there?").await }
    });
    llm.started.notified().await;
    handle.toggle_panel();
    handle.toggle_panel();
    llm.release.notify_one();

    assert!(matches!(task.await.unwrap(), SubmitOutcome::Replied(_)));
    assert_eq!(texts(&handle)[2].1, "Worth the wait.");
}

// =========================================================================
// submit: failure paths
// =========================================================================

#[tokio::test]
async fn submit_failure_scenario_rates_question() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(FailingLlm));
    let handle = test_helpers::seed_session(&state).await;

    let outcome = submit(&state, &handle, "What are your rates?").await;

    assert!(matches!(&outcome, SubmitOutcome::Fallback(m) if m.text() == persona::SERVICE_FAILURE_REPLY));
    let log = texts(&handle);
    assert_eq!(
        log,
        vec![
            (Role::Assistant, persona::GREETING.to_string()),
            (Role::Visitor, "What are your rates?".to_string()),
            (Role::Assistant, persona::SERVICE_FAILURE_REPLY.to_string()),
        ]
    );
    assert!(!handle.snapshot().is_awaiting_response);
}

#[tokio::test]
async fn repeated_failures_append_same_fallback() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(FailingLlm));
    let handle = test_helpers::seed_session(&state).await;

    for prompt in ["one", "two", "three"] {
        let outcome = submit(&state, &handle, prompt).await;
        assert_eq!(outcome.message().map(Message::text), Some(persona::SERVICE_FAILURE_REPLY));
    }
    assert_eq!(handle.snapshot().messages.len(), 7);
}

#[tokio::test]
async fn submit_without_llm_falls_back() {
    let state = test_helpers::test_app_state();
    let handle = test_helpers::seed_session(&state).await;

    let outcome = submit(&state, &handle, "anyone there?").await;
    assert!(matches!(&outcome, SubmitOutcome::Fallback(m) if m.text() == persona::SERVICE_FAILURE_REPLY));
    assert!(!handle.snapshot().is_awaiting_response);
}

#[tokio::test]
async fn submit_generator_panic_falls_back() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(PanickingLlm));
    let handle = test_helpers::seed_session(&state).await;

    let outcome = submit(&state, &handle, "hello").await;
    assert!(matches!(&outcome, SubmitOutcome::Fallback(m) if m.text() == persona::SERVICE_FAILURE_REPLY));
    assert!(!handle.snapshot().is_awaiting_response);

    // The session keeps working afterwards.
    let again = submit(&state, &handle, "hello again").await;
    assert!(matches!(again, SubmitOutcome::Fallback(_)));
    assert_eq!(handle.snapshot().messages.len(), 5);
}

#[tokio::test]
async fn dropped_submit_still_settles() {
    let llm = Arc::new(GatedLlm::new());
    let state = test_helpers::test_app_state_with_llm(llm);
    let handle = test_helpers::seed_session(&state).await;

    let result = timeout(Duration::from_millis(50), submit(&state, &handle, "hello")).await;
    assert!(result.is_err(), "gated generator never releases");

    let snap = handle.snapshot();
    assert!(!snap.is_awaiting_response);
    assert_eq!(snap.messages.len(), 3);
    assert_eq!(snap.messages[2].text(), persona::SERVICE_FAILURE_REPLY);
}

#[tokio::test]
async fn aborted_task_still_settles() {
    let llm = Arc::new(GatedLlm::new());
    let state = test_helpers::test_app_state_with_llm(llm.clone());
    let handle = test_helpers::seed_session(&state).await;

    let task = tokio::spawn({
        let state = state.clone();
        let handle = handle.clone();
        async move { submit(&state, &handle, "hello").await }
    });
    llm.started.notified().await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(!handle.snapshot().is_awaiting_response);
    assert_eq!(texts(&handle)[2].1, persona::SERVICE_FAILURE_REPLY);
}

#[tokio::test]
async fn rate_limited_submit_falls_back_without_calling_llm() {
    let llm = Arc::new(ScriptedLlm::new(vec![]));
    let mut state = test_helpers::test_app_state_with_llm(llm.clone());
    state.rate_limiter = RateLimiter::new(RateLimitConfig {
        per_session_limit: 1,
        per_session_window: Duration::from_secs(60),
        global_limit: 100,
        global_window: Duration::from_secs(60),
    });
    let handle = test_helpers::seed_session(&state).await;

    assert!(matches!(submit(&state, &handle, "one").await, SubmitOutcome::Replied(_)));
    let limited = submit(&state, &handle, "two").await;
    assert!(matches!(&limited, SubmitOutcome::Fallback(m) if m.text() == persona::SERVICE_FAILURE_REPLY));
    assert_eq!(llm.requests().len(), 1);
}

// =========================================================================
// registry
// =========================================================================

#[tokio::test]
async fn create_get_end_session() {
    let state = test_helpers::test_app_state();
    let handle = create_session(&state).await.unwrap();

    let found = get_session(&state, handle.id()).await.unwrap();
    assert_eq!(found.id(), handle.id());
    assert_eq!(found.snapshot().messages[0].text(), persona::GREETING);

    end_session(&state, handle.id()).await.unwrap();
    assert!(matches!(get_session(&state, handle.id()).await, Err(ChatError::NotFound(_))));
    assert!(matches!(end_session(&state, handle.id()).await, Err(ChatError::NotFound(_))));
}

#[tokio::test]
async fn create_session_respects_capacity() {
    let mut state = test_helpers::test_app_state();
    state.session_config.max_count = 1;

    create_session(&state).await.unwrap();
    let Err(err) = create_session(&state).await else {
        panic!("second session should exceed capacity");
    };
    assert!(matches!(err, ChatError::CapacityReached { max: 1 }));
    assert_eq!(err.error_code(), "E_SESSION_CAPACITY");
    assert!(err.retryable());
}

#[tokio::test]
async fn sessions_are_independent() {
    let state = test_helpers::test_app_state_with_llm(Arc::new(FailingLlm));
    let a = create_session(&state).await.unwrap();
    let b = create_session(&state).await.unwrap();

    submit(&state, &a, "hello").await;
    b.toggle_panel();

    assert_eq!(a.snapshot().messages.len(), 3);
    assert!(!a.snapshot().is_panel_open);
    assert_eq!(b.snapshot().messages.len(), 1);
    assert!(b.snapshot().is_panel_open);
}

#[tokio::test]
async fn sweep_removes_idle_but_keeps_awaiting() {
    let state = test_helpers::test_app_state();
    let idle = test_helpers::seed_session(&state).await;
    let busy = test_helpers::seed_session(&state).await;
    busy.with(|s| s.begin_turn("still waiting")).unwrap();

    let ttl = Duration::from_secs(60);
    let later = Instant::now() + Duration::from_secs(3600);
    let mut sessions = state.sessions.write().await;
    let removed = sweep_idle(&mut sessions, later, ttl);

    assert_eq!(removed, vec![idle.id()]);
    assert!(sessions.contains_key(&busy.id()));
}

#[test]
fn fresh_session_is_not_expired() {
    let handle = SessionHandle::new(Uuid::new_v4());
    assert!(!handle.is_expired(Instant::now(), Duration::from_secs(60)));
}

#[test]
fn update_pending_input_round_trips_through_snapshot() {
    let handle = SessionHandle::new(Uuid::new_v4());
    handle.update_pending_input("half a thought");
    assert_eq!(handle.snapshot().pending_input, "half a thought");
}
