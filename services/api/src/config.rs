//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// API keys for the nutrition estimator; the adapter rotates through
    /// them with a cursor. Comma-separated in `OPENAI_API_KEYS`.
    pub openai_api_keys: Vec<String>,
    pub target_model: String,
    pub food_model: String,
    /// Upper bound on any single estimator call.
    pub llm_timeout: Duration,
    /// Capacity of the background target-recompute queue.
    pub target_queue_capacity: usize,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys ---
        // Either a comma-separated OPENAI_API_KEYS list or a single
        // OPENAI_API_KEY. More keys mean more upstream quota; the adapter
        // round-robins across them.
        let openai_api_keys: Vec<String> = match std::env::var("OPENAI_API_KEYS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => std::env::var("OPENAI_API_KEY").into_iter().collect(),
        };
        if openai_api_keys.is_empty() {
            return Err(ConfigError::MissingVar("OPENAI_API_KEYS".to_string()));
        }

        // --- Load Adapter-specific Settings ---
        let target_model =
            std::env::var("TARGET_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let food_model = std::env::var("FOOD_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let llm_timeout_secs = match std::env::var("LLM_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("LLM_TIMEOUT_SECS".to_string(), e.to_string())
            })?,
            Err(_) => 20,
        };

        let target_queue_capacity = match std::env::var("TARGET_QUEUE_CAPACITY") {
            Ok(raw) => raw.parse::<usize>().map_err(|e| {
                ConfigError::InvalidValue("TARGET_QUEUE_CAPACITY".to_string(), e.to_string())
            })?,
            Err(_) => 256,
        };

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_keys,
            target_model,
            food_model,
            llm_timeout: Duration::from_secs(llm_timeout_secs),
            target_queue_capacity,
            cors_origin,
        })
    }
}
