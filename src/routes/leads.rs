//! Contact form relay route.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use tracing::warn;

use crate::routes::{ApiError, ErrorCode};
use crate::services::lead::{LeadError, LeadForm};
use crate::state::AppState;

pub(crate) fn lead_error_to_api(err: &LeadError) -> ApiError {
    let status = match err {
        LeadError::MissingField(_) => StatusCode::BAD_REQUEST,
        LeadError::Rejected { .. } | LeadError::Transport(_) => StatusCode::BAD_GATEWAY,
        LeadError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
    };
    ApiError::with_message(status, err, err.visitor_message())
}

/// `POST /api/leads` — validate the contact form and forward it.
pub async fn submit_lead(
    State(state): State<AppState>,
    Json(form): Json<LeadForm>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let form = form.validated().map_err(|e| lead_error_to_api(&e))?;
    let Some(relay) = state.leads.as_ref() else {
        warn!("lead: relay not configured, LEAD_FORM_ENDPOINT unset");
        return Err(lead_error_to_api(&LeadError::NotConfigured));
    };

    relay.forward(&form).await.map_err(|e| {
        warn!(code = e.error_code(), error = %e, "lead: relay failed");
        lead_error_to_api(&e)
    })?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
#[path = "leads_test.rs"]
mod tests;
