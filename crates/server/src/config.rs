use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres URL; the in-process store is used when unset.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    /// Base URL of the move-generation engine.
    pub engine_url: Option<String>,
    pub engine_player_id: String,
    pub store_timeout: Duration,
    pub session_idle_ttl: Duration,
    pub session_sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            jwt_secret: env::var("JWT_SECRET_KEY")
                .unwrap_or_else(|_| "dev-secret-key-change-in-production".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT").unwrap_or(8000),
            engine_url: env::var("ENGINE_URL").ok().filter(|v| !v.is_empty()),
            engine_player_id: env::var("ENGINE_PLAYER_ID")
                .unwrap_or_else(|_| "engine".to_string()),
            store_timeout: Duration::from_millis(parse_var("STORE_TIMEOUT_MS").unwrap_or(5_000)),
            session_idle_ttl: Duration::from_secs(
                parse_var("SESSION_IDLE_TTL_SECS").unwrap_or(30 * 60),
            ),
            session_sweep_interval: Duration::from_secs(
                parse_var("SESSION_SWEEP_INTERVAL_SECS").unwrap_or(60),
            ),
        }
    }

    /// Defaults for tests and local tooling: in-process store, no engine.
    pub fn local() -> Self {
        Self {
            database_url: None,
            jwt_secret: "dev-secret-key-change-in-production".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            engine_url: None,
            engine_player_id: "engine".to_string(),
            store_timeout: Duration::from_secs(5),
            session_idle_ttl: Duration::from_secs(30 * 60),
            session_sweep_interval: Duration::from_secs(60),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
