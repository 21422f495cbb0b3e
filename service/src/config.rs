//! Configuration management for the service.

use fieldkit_engine::OptionPolicy;
use std::env;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Page size applied when a search doesn't specify one
    pub default_page_size: u32,
    /// Policy for narrowing a choice field's options
    pub option_policy: OptionPolicy,
}

impl Config {
    /// Load configuration from environment variables, reading a `.env` file
    /// first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let default_page_size = env::var("DEFAULT_PAGE_SIZE")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPageSize)?;

        let option_policy = match env::var("OPTION_POLICY") {
            Ok(raw) => raw.parse().map_err(ConfigError::InvalidOptionPolicy)?,
            Err(_) => OptionPolicy::default(),
        };

        Ok(Self {
            database_url,
            default_page_size,
            option_policy,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid DEFAULT_PAGE_SIZE value")]
    InvalidPageSize,

    #[error("Invalid OPTION_POLICY value: {0}")]
    InvalidOptionPolicy(String),
}
