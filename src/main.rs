mod config;
mod conversation;
mod llm;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use crate::llm::TextGenerator;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env().expect("invalid server config");

    // Initialize LLM client (non-fatal: every submit falls back if config missing).
    let llm: Option<Arc<dyn TextGenerator>> = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM client not configured, chat replies will fall back");
            None
        }
    };

    let leads = match services::lead::LeadConfig::from_env() {
        Some(lead_config) => match services::lead::LeadRelay::new(lead_config) {
            Ok(relay) => {
                tracing::info!(endpoint = relay.endpoint(), "lead relay initialized");
                Some(relay)
            }
            Err(e) => {
                tracing::warn!(error = %e, "lead relay failed to initialize, contact form disabled");
                None
            }
        },
        None => {
            tracing::warn!("LEAD_FORM_ENDPOINT not set, contact form disabled");
            None
        }
    };

    let rate_limiter = rate_limit::RateLimiter::new(rate_limit::RateLimitConfig::from_env());
    let state = state::AppState::new(&config, llm, leads, rate_limiter);

    // Spawn background session sweeper.
    let _sweeper = services::sweeper::spawn_session_sweeper(state.clone());

    let app = routes::app(state, config.website_dir.as_deref());
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "shop foreman listening");
    axum::serve(listener, app).await.expect("server failed");
}
