//! `AppConfig` — the process-wide configuration singleton (§6 "Environment",
//! §9 "Process-wide singletons").
//!
//! The source's `getInstance(env)` idiom is re-architected as an immutable
//! value resolved once from the environment and handed out by reference
//! thereafter; `AppConfig::get` is the only place that reads `std::env`.

use std::env;
use std::sync::OnceLock;

use crate::error::ApiError;

/// Upstream base URLs and credentials resolved once per process.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub hiro_api_base_url: String,
    pub hiro_api_key: Option<String>,
    pub stx_city_base_url: String,
    pub stacks_node_base_url: String,
    pub stats_db_url: String,
    pub stats_db_service_key: String,
    pub bind_addr: String,
}

static INSTANCE: OnceLock<AppConfig> = OnceLock::new();

impl AppConfig {
    /// Resolves configuration from the environment on first call; every
    /// later call returns the same value without touching `std::env` again.
    pub fn get() -> Result<&'static AppConfig, ApiError> {
        if let Some(cfg) = INSTANCE.get() {
            return Ok(cfg);
        }
        let cfg = Self::from_env()?;
        // `set` losing the race is fine: another thread built an equivalent
        // config from the same environment and we just use that one.
        let _ = INSTANCE.set(cfg);
        Ok(INSTANCE.get().expect("just initialized"))
    }

    fn from_env() -> Result<Self, ApiError> {
        Ok(Self {
            hiro_api_base_url: env::var("HIRO_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.hiro.so".to_string()),
            hiro_api_key: env::var("HIRO_API_KEY").ok(),
            stx_city_base_url: env::var("STX_CITY_BASE_URL")
                .unwrap_or_else(|_| "https://stx.city".to_string()),
            stacks_node_base_url: env::var("STACKS_NODE_BASE_URL")
                .unwrap_or_else(|_| "https://api.hiro.so".to_string()),
            stats_db_url: env::var("STATS_DB_URL")
                .map_err(|_| ApiError::config("STATS_DB_URL is not set"))?,
            stats_db_service_key: env::var("STATS_DB_SERVICE_KEY")
                .map_err(|_| ApiError::config("STATS_DB_SERVICE_KEY is not set"))?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string()),
        })
    }

    /// Test-only: builds a config without touching the environment or the
    /// process-wide singleton.
    #[doc(hidden)]
    pub fn for_tests() -> Self {
        Self {
            hiro_api_base_url: "http://localhost:0".to_string(),
            hiro_api_key: None,
            stx_city_base_url: "http://localhost:0".to_string(),
            stacks_node_base_url: "http://localhost:0".to_string(),
            stats_db_url: "http://localhost:0".to_string(),
            stats_db_service_key: "test".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_tests_never_touches_env() {
        let cfg = AppConfig::for_tests();
        assert_eq!(cfg.stats_db_service_key, "test");
    }
}
