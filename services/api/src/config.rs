//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use bookrec_core::recommend::{RecommendationConfig, DEFAULT_TRENDING_THRESHOLD};
use std::net::SocketAddr;
use std::str::FromStr;
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
    /// Origin allowed by CORS. `None` allows any origin without credentials.
    pub cors_origin: Option<String>,
    pub trending_threshold: f64,
    pub recommendation_count: usize,
    /// Load the bundled catalog into an empty `books` table at startup.
    pub seed_catalog: bool,
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
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = std::env::var("CORS_ORIGIN").ok().filter(|o| !o.trim().is_empty());

        // --- Load Recommendation Settings ---
        let trending_threshold = parse_var("TRENDING_THRESHOLD", DEFAULT_TRENDING_THRESHOLD)?;
        if !(0.0..=5.0).contains(&trending_threshold) {
            return Err(ConfigError::InvalidValue(
                "TRENDING_THRESHOLD".to_string(),
                format!("{} is outside the 0-5 rating scale", trending_threshold),
            ));
        }
        let recommendation_count = parse_var("RECOMMENDATION_COUNT", 8usize)?;
        let seed_catalog = parse_flag("SEED_CATALOG", std::env::var("SEED_CATALOG").ok(), true)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            trending_threshold,
            recommendation_count,
            seed_catalog,
        })
    }

    /// Engine settings derived from this configuration.
    pub fn recommendation_config(&self) -> RecommendationConfig {
        RecommendationConfig {
            display_count: self.recommendation_count,
            trending_threshold: self.trending_threshold,
            ..RecommendationConfig::default()
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_flag(name: &str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a boolean", other),
        )),
    }
}
