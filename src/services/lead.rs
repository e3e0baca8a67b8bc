//! Lead service — validates the contact form and relays it to the form
//! endpoint.
//!
//! ERROR HANDLING
//! ==============
//! The visitor only ever sees one of two canned lines. The endpoint status or
//! transport error is logged for operators.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::env_parse;
use crate::conversation::persona::CREW_PHONE;
use crate::routes::ErrorCode;

const DEFAULT_LEAD_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Shown when the endpoint answers with a non-success status.
pub const REJECTED_REPLY: &str = "Something went wrong. Please call us.";

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl LeadConfig {
    /// `None` when `LEAD_FORM_ENDPOINT` is unset or blank.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let endpoint = lookup("LEAD_FORM_ENDPOINT")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())?;
        let timeout_secs = env_parse(&lookup, "LEAD_REQUEST_TIMEOUT_SECS", DEFAULT_LEAD_REQUEST_TIMEOUT_SECS);
        Some(Self { endpoint, timeout: Duration::from_secs(timeout_secs) })
    }
}

// =============================================================================
// FORM
// =============================================================================

/// Service the visitor is asking about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    #[default]
    Removal,
    Trimming,
    Stump,
    Storm,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub service: ServiceCategory,
    #[serde(default)]
    pub message: String,
}

impl LeadForm {
    /// Trim every text field and require a name and a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::MissingField`] naming the first blank required field.
    pub fn validated(self) -> Result<Self, LeadError> {
        let form = Self {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
            service: self.service,
            message: self.message.trim().to_string(),
        };
        if form.name.is_empty() {
            return Err(LeadError::MissingField("name"));
        }
        if form.phone.is_empty() {
            return Err(LeadError::MissingField("phone"));
        }
        Ok(form)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("form endpoint rejected lead: status {status}")]
    Rejected { status: u16 },
    #[error("form endpoint unreachable: {0}")]
    Transport(String),
    #[error("lead relay not configured")]
    NotConfigured,
}

impl ErrorCode for LeadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "E_LEAD_MISSING_FIELD",
            Self::Rejected { .. } => "E_LEAD_REJECTED",
            Self::Transport(_) => "E_LEAD_TRANSPORT",
            Self::NotConfigured => "E_LEAD_NOT_CONFIGURED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl LeadError {
    /// Text the contact form shows the visitor.
    #[must_use]
    pub fn visitor_message(&self) -> String {
        match self {
            Self::MissingField(field) => format!("Please fill in your {field}."),
            Self::Rejected { .. } => REJECTED_REPLY.to_string(),
            Self::Transport(_) | Self::NotConfigured => format!("System's acting up. {CREW_PHONE} works better."),
        }
    }
}

// =============================================================================
// RELAY
// =============================================================================

pub struct LeadRelay {
    http: reqwest::Client,
    endpoint: String,
}

impl LeadRelay {
    /// # Errors
    ///
    /// Returns [`LeadError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: LeadConfig) -> Result<Self, LeadError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LeadError::Transport(e.to_string()))?;
        Ok(Self { http, endpoint: config.endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Post one validated lead to the form endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`LeadError::Rejected`] on a non-2xx status and
    /// [`LeadError::Transport`] if the request never completes.
    pub async fn forward(&self, form: &LeadForm) -> Result<(), LeadError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(form)
            .send()
            .await
            .map_err(|e| LeadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "lead: endpoint rejected lead");
            return Err(LeadError::Rejected { status: status.as_u16() });
        }

        info!(service = ?form.service, "lead: relayed");
        Ok(())
    }
}

#[cfg(test)]
#[path = "lead_test.rs"]
mod tests;
