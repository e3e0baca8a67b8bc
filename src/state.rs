//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the live chat sessions, the optional generator and lead relay,
//! and the rate limiter. Sessions live only in memory; nothing survives a
//! restart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::{ServerConfig, SessionConfig};
use crate::llm::TextGenerator;
use crate::rate_limit::RateLimiter;
use crate::services::chat::SessionHandle;
use crate::services::lead::LeadRelay;

/// Shared application state, injected into Axum handlers via State extractor.
/// Cheap to clone; every shared field sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
    /// Optional generator. `None` if LLM env vars are not configured; every
    /// submit then settles with the failure fallback.
    pub llm: Option<Arc<dyn TextGenerator>>,
    /// Optional lead relay. `None` if `LEAD_FORM_ENDPOINT` is unset.
    pub leads: Option<Arc<LeadRelay>>,
    /// In-memory rate limiter for generation calls.
    pub rate_limiter: RateLimiter,
    pub session_config: SessionConfig,
    /// Output-token cap passed with every generation request.
    pub max_tokens: u32,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        llm: Option<Arc<dyn TextGenerator>>,
        leads: Option<LeadRelay>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            llm,
            leads: leads.map(Arc::new),
            rate_limiter,
            session_config: config.sessions,
            max_tokens: config.max_tokens,
        }
    }

    #[cfg(test)]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
