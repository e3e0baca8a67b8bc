//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the chat widget and contact-form endpoints under a
//! single Axum router. When `WEBSITE_DIR` is configured, the marketing site
//! is served as static files from the fallback route.

pub mod chat;
pub mod leads;

use std::path::Path;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Stable machine-readable code for errors that are logged or cross the
/// HTTP boundary.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// JSON body for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ErrorBody {
    pub fn from_error(err: &impl ErrorCode) -> Self {
        Self { code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }
}

/// An error status paired with its JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, err: &impl ErrorCode) -> Self {
        Self { status, body: ErrorBody::from_error(err) }
    }

    /// Same as [`ApiError::new`] with a visitor-facing message in place of the
    /// error's own text.
    pub fn with_message(status: StatusCode, err: &impl ErrorCode, message: impl Into<String>) -> Self {
        let mut api = Self::new(status, err);
        api.body.message = message.into();
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// API routes plus the optional static site.
pub fn app(state: AppState, website_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/api/chat/sessions", post(chat::create_session))
        .route(
            "/api/chat/sessions/{id}",
            get(chat::get_session).delete(chat::end_session),
        )
        .route("/api/chat/sessions/{id}/messages", post(chat::submit))
        .route("/api/chat/sessions/{id}/input", put(chat::update_input))
        .route("/api/chat/sessions/{id}/panel", post(chat::toggle_panel))
        .route("/api/leads", post(leads::submit_lead))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match website_dir {
        Some(dir) if dir.is_dir() => {
            router.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true))
        }
        Some(dir) => {
            tracing::warn!(dir = %dir.display(), "WEBSITE_DIR is not a directory, static site disabled");
            router
        }
        None => router,
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::chat::ChatError;
    use uuid::Uuid;

    #[test]
    fn error_body_carries_code_and_retryable() {
        let body = ErrorBody::from_error(&ChatError::CapacityReached { max: 3 });
        assert_eq!(body.code, "E_SESSION_CAPACITY");
        assert!(body.retryable);
        assert!(body.message.contains('3'));
    }

    #[test]
    fn api_error_with_message_overrides_text() {
        let err = ChatError::NotFound(Uuid::nil());
        let api = ApiError::with_message(StatusCode::NOT_FOUND, &err, "gone");
        assert_eq!(api.status, StatusCode::NOT_FOUND);
        assert_eq!(api.body.code, "E_SESSION_NOT_FOUND");
        assert_eq!(api.body.message, "gone");
        assert!(!api.body.retryable);
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        assert_eq!(healthz().await, StatusCode::OK);
    }

    #[test]
    fn app_builds_without_site_dir() {
        let _router = app(crate::state::test_helpers::test_app_state(), None);
        let _router = app(
            crate::state::test_helpers::test_app_state(),
            Some(Path::new("/definitely/not/a/site")),
        );
    }
}
