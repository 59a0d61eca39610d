//! Server configuration
//!
//! All settings can be overridden through environment variables:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | HTTP_PORT | 4000 | HTTP API + WebSocket port |
//! | SESSION_QUEUE_CAPACITY | 64 | per-session outbound event queue |
//! | SESSION_IDLE_TIMEOUT_SECS | 120 | silent sessions are disconnected |
//! | SESSION_PING_INTERVAL_SECS | 30 | server keepalive ping cadence |
//! | ENVIRONMENT | development | development / staging / production |
//! | LOG_DIR | (unset) | optional daily-rolling log directory |
//!
//! # Example
//!
//! ```ignore
//! HTTP_PORT=8080 SESSION_IDLE_TIMEOUT_SECS=60 cargo run
//! ```

use crate::auth::JwtConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API service port
    pub http_port: u16,
    /// Capacity of each session's outbound event queue
    pub session_queue_capacity: usize,
    /// Idle window after which a silent session is disconnected (seconds)
    pub session_idle_timeout_secs: u64,
    /// Keepalive ping cadence (seconds)
    pub session_ping_interval_secs: u64,
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Runtime environment: development | staging | production
    pub environment: String,
    /// Optional log directory for file output
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(4000),
            session_queue_capacity: std::env::var("SESSION_QUEUE_CAPACITY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(64),
            session_idle_timeout_secs: std::env::var("SESSION_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(120),
            session_ping_interval_secs: std::env::var("SESSION_PING_INTERVAL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30),
            jwt: JwtConfig::default(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }

    /// Override selected values, mostly for tests
    pub fn with_overrides(http_port: u16, session_queue_capacity: usize) -> Self {
        let mut config = Self::from_env();
        config.http_port = http_port;
        config.session_queue_capacity = session_queue_capacity;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
