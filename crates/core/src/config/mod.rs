//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (COPERTINE_*)
//! 2. TOML config file (if COPERTINE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::schedule::SchedulePolicy;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (COPERTINE_*)
/// 2. TOML config file (if COPERTINE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the search/index store.
    ///
    /// Set via COPERTINE_STORE_URL environment variable.
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Bearer token for the search/index store, if it requires one.
    ///
    /// Set via COPERTINE_STORE_API_KEY environment variable.
    #[serde(default)]
    pub store_api_key: Option<String>,

    /// Collection holding the daily items.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Path to SQLite database for the search cache and media mapping.
    ///
    /// Set via COPERTINE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory or base URL under which media files live.
    ///
    /// Set via COPERTINE_MEDIA_ROOT environment variable.
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// Items per page. Constant for the process lifetime.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    /// How many leading pages the background sweep warms.
    #[serde(default = "default_prefetch_pages")]
    pub prefetch_pages: u32,

    /// Start of the daily invalidation window (HH:MM, local time).
    #[serde(default = "default_invalidation_start")]
    pub invalidation_start: String,

    /// End of the daily invalidation window (HH:MM, local time).
    #[serde(default = "default_refresh_complete")]
    pub refresh_complete: String,

    /// Number of results returned by a search.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,

    /// Capacity of the media prefetch queue.
    #[serde(default = "default_prefetch_queue")]
    pub prefetch_queue: usize,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via COPERTINE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_store_url() -> String {
    "http://localhost:8080".into()
}

fn default_collection() -> String {
    "Copertine".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./copertine-cache.sqlite")
}

fn default_media_root() -> String {
    "./media".into()
}

fn default_page_limit() -> u32 {
    30
}

fn default_prefetch_pages() -> u32 {
    3
}

fn default_invalidation_start() -> String {
    "05:00".into()
}

fn default_refresh_complete() -> String {
    "05:10".into()
}

fn default_search_limit() -> u32 {
    30
}

fn default_prefetch_queue() -> usize {
    64
}

fn default_user_agent() -> String {
    "copertine/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            store_api_key: None,
            collection: default_collection(),
            db_path: default_db_path(),
            media_root: default_media_root(),
            page_limit: default_page_limit(),
            prefetch_pages: default_prefetch_pages(),
            invalidation_start: default_invalidation_start(),
            refresh_complete: default_refresh_complete(),
            search_limit: default_search_limit(),
            prefetch_queue: default_prefetch_queue(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Whether media paths are URLs rather than filesystem paths.
    pub fn media_is_remote(&self) -> bool {
        self.media_root.starts_with("http://") || self.media_root.starts_with("https://")
    }

    /// The daily invalidation schedule described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if either time fails to parse or the
    /// window is empty.
    pub fn schedule_policy(&self) -> Result<SchedulePolicy, ConfigError> {
        SchedulePolicy::parse(&self.invalidation_start, &self.refresh_complete)
            .map_err(|e| ConfigError::Invalid { field: "invalidation_start".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `COPERTINE_`
    /// 2. TOML file from `COPERTINE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("COPERTINE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("COPERTINE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
