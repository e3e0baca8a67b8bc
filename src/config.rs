//! Server configuration parsed from environment variables.
//!
//! Every knob has a default; only a malformed `PORT` is fatal. Parsers take a
//! key-lookup closure so tests never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 1800;
const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_SESSION_MAX_COUNT: usize = 10_000;
const DEFAULT_AI_MAX_TOKENS: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Parse `key` through `lookup`, falling back to `default` when the value is
/// absent or does not parse.
pub(crate) fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Lifetime limits for in-memory chat sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Sessions untouched for longer than this are swept.
    pub idle_ttl: Duration,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
    /// Session creation fails once this many are live.
    pub max_count: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SESSION_SWEEP_INTERVAL_SECS),
            max_count: DEFAULT_SESSION_MAX_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Static site directory served as the fallback route, if any.
    pub website_dir: Option<PathBuf>,
    pub sessions: SessionConfig,
    /// Output-token cap for each generation call.
    pub max_tokens: u32,
}

impl ServerConfig {
    /// Build server config from environment variables.
    ///
    /// - `PORT`: default 3000
    /// - `WEBSITE_DIR`: unset disables static file serving
    /// - `SESSION_IDLE_TTL_SECS`: default 1800
    /// - `SESSION_SWEEP_INTERVAL_SECS`: default 60
    /// - `SESSION_MAX_COUNT`: default 10000
    /// - `AI_MAX_TOKENS`: default 1024
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but is not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`], reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but is not a valid port number.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw.clone() })?,
        };
        let website_dir = lookup("WEBSITE_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        let sessions = SessionConfig {
            idle_ttl: Duration::from_secs(env_parse(&lookup, "SESSION_IDLE_TTL_SECS", DEFAULT_SESSION_IDLE_TTL_SECS)),
            sweep_interval: Duration::from_secs(
                env_parse(&lookup, "SESSION_SWEEP_INTERVAL_SECS", DEFAULT_SESSION_SWEEP_INTERVAL_SECS).max(1),
            ),
            max_count: env_parse(&lookup, "SESSION_MAX_COUNT", DEFAULT_SESSION_MAX_COUNT),
        };
        let max_tokens = env_parse(&lookup, "AI_MAX_TOKENS", DEFAULT_AI_MAX_TOKENS);

        Ok(Self { port, website_dir, sessions, max_tokens })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
