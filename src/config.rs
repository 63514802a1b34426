//! Application configuration loaded from environment variables.
//!
//! Everything this engine needs is non-sensitive: the store URL, the core
//! backend's internal API base URL, and the listen port.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis-compatible ephemeral store URL
    pub redis_url: String,
    /// Base URL of the core backend's internal API (tenant directory,
    /// attendance/streak data, live check-in counts)
    pub core_api_url: String,
    /// Server port
    pub port: u16,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            core_api_url: "http://localhost:3000".to_string(),
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            core_api_url: env::var("CORE_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("CORE_API_URL"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("CORE_API_URL", "http://core.internal:3000/");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.core_api_url, "http://core.internal:3000");
        assert_eq!(config.port, 8080);
    }
}
