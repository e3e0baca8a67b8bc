//! Sweeper service — background eviction of idle chat sessions.
//!
//! DESIGN
//! ======
//! Widgets that vanish without a page-unload call leave their session behind.
//! A background task wakes every `sweep_interval` and drops sessions idle
//! past `idle_ttl`. Sessions waiting on a reply are skipped; their turn still
//! settles on the handle.

use std::time::Instant;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::services::chat::sweep_idle;
use crate::state::AppState;

/// Spawn the background sweeper. Returns a handle for shutdown.
pub fn spawn_session_sweeper(state: AppState) -> JoinHandle<()> {
    let config = state.session_config;
    info!(
        idle_ttl_secs = config.idle_ttl.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        max_sessions = config.max_count,
        "session sweeper configured"
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweep_once(&state).await;
        }
    })
}

/// Run one sweep pass. Returns how many sessions were evicted.
pub async fn sweep_once(state: &AppState) -> usize {
    let removed = {
        let mut sessions = state.sessions.write().await;
        sweep_idle(&mut sessions, Instant::now(), state.session_config.idle_ttl)
    };
    for session_id in &removed {
        state.rate_limiter.forget(*session_id);
    }
    if removed.is_empty() {
        debug!("session sweep: nothing idle");
    } else {
        info!(evicted = removed.len(), "session sweep: evicted idle sessions");
    }
    removed.len()
}
