//! invalidate_all tool implementation.
//!
//! Drops every cached page, media path and search result, then restarts the
//! prefetch sweep.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the invalidate_all tool (none).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InvalidateAllParams {}

/// Output from the invalidate_all tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InvalidateAllOutput {
    /// Number of cached pages dropped.
    pub cleared_pages: usize,
    /// Number of cached searches deleted.
    pub purged_searches: u64,
    /// False when a running sweep absorbed the request as a trailing pass.
    pub sweep_started: bool,
}

/// Implementation of the invalidate_all tool.
pub async fn invalidate_impl(state: &AppState, _params: InvalidateAllParams) -> Result<CallToolResult, McpError> {
    let cleared = state.pages.clear().await;
    state.media.clear().await;
    let purged_searches = state.db.purge_all_search().await?;

    tracing::info!(cleared_pages = cleared.pages, purged_searches, "all caches invalidated");

    let output = InvalidateAllOutput {
        cleared_pages: cleared.pages,
        purged_searches,
        sweep_started: cleared.sweep.is_some(),
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{env, output};
    use crate::tools::get_page::{GetPageOutput, GetPageParams, get_page_impl};
    use crate::tools::media::{GetMediaPathParams, media_path_impl};
    use crate::tools::search::{SearchParams, search_impl};

    #[tokio::test]
    async fn test_invalidate_everything() {
        let env = env(95).await;
        let page = GetPageParams { offset: 0, limit: None, prefetch_next: true };
        get_page_impl(&env.state, page.clone()).await.unwrap();
        get_page_impl(&env.state, GetPageParams { offset: 30, ..page.clone() }).await.unwrap();
        media_path_impl(&env.state, GetMediaPathParams { filename: "a.jpg".into() }).await.unwrap();
        search_impl(&env.state, SearchParams { query: "roma".into(), mode: "literal".into(), force_refresh: false })
            .await
            .unwrap();

        let out: InvalidateAllOutput = output(&invalidate_impl(&env.state, InvalidateAllParams {}).await.unwrap());
        assert_eq!(out.cleared_pages, 2);
        assert_eq!(out.purged_searches, 1);
        assert!(out.sweep_started);

        assert_eq!(env.state.media.known_paths().await, 0);
        assert!(!env.state.media.is_prefetched(0).await);

        let after: GetPageOutput = output(&get_page_impl(&env.state, page).await.unwrap());
        assert!(!after.served_from_cache);
        assert_eq!(env.store.page_calls(), 3);
    }
}
