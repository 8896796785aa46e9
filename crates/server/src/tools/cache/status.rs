//! cache_status tool implementation.
//!
//! Reports what the page cache holds and how the schedule sees it now.

use chrono::NaiveDateTime;
use copertine_core::pages::EntryStatus;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_status tool (none).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusParams {}

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    pub now: NaiveDateTime,
    /// Whether `now` falls inside the daily invalidation window.
    pub in_window: bool,
    /// Start of the next window, absent while inside one.
    pub next_invalidation: Option<NaiveDateTime>,
    pub page_limit: u32,
    pub sweep_running: bool,
    /// Every cached offset, ascending.
    pub pages: Vec<EntryStatus>,
    pub media: MediaStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MediaStatus {
    pub root: String,
    pub known_paths: usize,
    pub resolutions: u64,
    pub last_refresh: Option<NaiveDateTime>,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(state: &AppState, _params: CacheStatusParams) -> Result<CallToolResult, McpError> {
    let now = state.clock.now();
    let output = CacheStatusOutput {
        now,
        in_window: state.policy.in_window(now),
        next_invalidation: state.policy.next_invalidation(now),
        page_limit: state.pages.page_limit(),
        sweep_running: state.pages.sweep_running().await,
        pages: state.pages.snapshot().await,
        media: MediaStatus {
            root: state.media.root().to_string(),
            known_paths: state.media.known_paths().await,
            resolutions: state.media.resolutions(),
            last_refresh: state.media.last_refresh().await,
        },
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::state::testing::{env, noon, output};

    #[tokio::test]
    async fn test_status_reports_entries() {
        let env = env(95).await;
        env.state.pages.get(30).await.unwrap();
        env.state.pages.get(0).await.unwrap();

        let out: CacheStatusOutput = output(&status_impl(&env.state, CacheStatusParams {}).await.unwrap());
        assert_eq!(out.now, noon());
        assert!(!out.in_window);
        assert_eq!(out.next_invalidation, Some(noon() + TimeDelta::hours(17)));
        assert_eq!(out.pages.iter().map(|p| p.offset).collect::<Vec<_>>(), vec![0, 30]);
        assert!(out.pages.iter().all(|p| p.valid));
        assert_eq!(out.media.root, "/srv/media");
    }

    #[tokio::test]
    async fn test_status_inside_window() {
        let env = env(95).await;
        env.state.pages.get(0).await.unwrap();
        env.clock.advance(TimeDelta::hours(17) + TimeDelta::minutes(5));

        let out: CacheStatusOutput = output(&status_impl(&env.state, CacheStatusParams {}).await.unwrap());
        assert!(out.in_window);
        assert!(out.next_invalidation.is_none());
        assert!(!out.pages[0].valid);
    }
}
