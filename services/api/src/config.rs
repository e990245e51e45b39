//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// `DATABASE_URL` prefix that selects the in-memory store.
pub const MEMORY_DATABASE_PREFIX: &str = "memory://";

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub jwt_secret: String,
    pub jwt_expiration_secs: i64,
    pub cors_allowed_origins: Vec<String>,
    /// Card generation is disabled when unset.
    pub openai_api_key: Option<String>,
    pub generation_model: String,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"), 5)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Session Tokens ---
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("JWT_SECRET".to_string()))?;
        let jwt_expiration_secs =
            parse_or("JWT_EXPIRATION_SECS", lookup("JWT_EXPIRATION_SECS"), 86_400)?;
        if jwt_expiration_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "JWT_EXPIRATION_SECS".to_string(),
                "must be positive".to_string(),
            ));
        }

        // --- CORS ---
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // --- Card Generation ---
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|s| !s.is_empty());
        let generation_model =
            lookup("GENERATION_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            jwt_secret,
            jwt_expiration_secs,
            cors_allowed_origins,
            openai_api_key,
            generation_model,
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with(MEMORY_DATABASE_PREFIX)
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/flashcards"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.jwt_expiration_secs, 86_400);
        assert_eq!(config.cors_allowed_origins, vec!["http://localhost:3000"]);
        assert!(!config.uses_memory_store());
        assert_eq!(config.openai_api_key, None);
        assert_eq!(config.generation_model, "gpt-4o-mini");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDRESS", "127.0.0.1:9000"),
            ("RUST_LOG", "debug"),
            ("JWT_EXPIRATION_SECS", "60"),
            ("CORS_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("OPENAI_API_KEY", "sk-test"),
            ("GENERATION_MODEL", "gpt-4.1"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address.to_string(), "127.0.0.1:9000");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.jwt_expiration_secs, 60);
        assert_eq!(
            config.cors_allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert!(config.uses_memory_store());
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.generation_model, "gpt-4.1");
    }

    #[test]
    fn required_and_invalid_values_are_reported() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("JWT_SECRET", "s")])),
            Err(ConfigError::MissingVar(var)) if var == "DATABASE_URL"
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("DATABASE_URL", "memory://")])),
            Err(ConfigError::MissingVar(var)) if var == "JWT_SECRET"
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[
                ("DATABASE_URL", "memory://"),
                ("JWT_SECRET", "s"),
                ("JWT_EXPIRATION_SECS", "soon"),
            ])),
            Err(ConfigError::InvalidValue(var, _)) if var == "JWT_EXPIRATION_SECS"
        ));
    }
}
