//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `page_limit` is 0 or exceeds 100
    /// - `prefetch_pages` exceeds 50
    /// - the invalidation window does not parse or is empty
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `store_url`, `collection`, `media_root` or `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `store_url` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_url.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "store_url".into(),
                hint: "Set COPERTINE_STORE_URL environment variable".into(),
            });
        }
        if !self.store_url.starts_with("http://") && !self.store_url.starts_with("https://") {
            return Err(ConfigError::Invalid { field: "store_url".into(), reason: "must be an http(s) URL".into() });
        }

        if self.collection.is_empty() {
            return Err(ConfigError::Invalid { field: "collection".into(), reason: "must not be empty".into() });
        }

        if self.page_limit == 0 {
            return Err(ConfigError::Invalid { field: "page_limit".into(), reason: "must be greater than 0".into() });
        }
        if self.page_limit > 100 {
            return Err(ConfigError::Invalid { field: "page_limit".into(), reason: "must not exceed 100".into() });
        }

        if self.prefetch_pages > 50 {
            return Err(ConfigError::Invalid { field: "prefetch_pages".into(), reason: "must not exceed 50".into() });
        }

        if self.search_limit == 0 || self.search_limit > 100 {
            return Err(ConfigError::Invalid { field: "search_limit".into(), reason: "must be between 1 and 100".into() });
        }

        if self.prefetch_queue == 0 {
            return Err(ConfigError::Invalid {
                field: "prefetch_queue".into(),
                reason: "must be greater than 0".into(),
            });
        }

        self.schedule_policy()?;

        if self.media_root.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "media_root".into(), reason: "must not be empty".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.prefetch_pages == 0 {
            tracing::warn!("prefetch_pages is 0; the background sweep will not warm any page");
        }

        Ok(())
    }
}
