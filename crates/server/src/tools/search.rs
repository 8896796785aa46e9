//! search tool implementation.
//!
//! Literal (BM25) or fuzzy (vector) search against the store. Results are
//! cached in SQLite until the next daily invalidation.

use copertine_client::{SearchMode, SearchRequest};
use copertine_core::cache::hash::compute_search_key;
use copertine_core::{Error, ResultItem};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::AppState;

/// Input parameters for search tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Search query (required, max 400 chars).
    pub query: String,

    /// Search mode: "literal" (default, keyword ranking) or "fuzzy" (semantic).
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Force a refresh, bypassing the cache.
    #[serde(default)]
    pub force_refresh: bool,
}

fn default_mode() -> String {
    "literal".into()
}

/// Output structure for search tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchOutput {
    pub results: Vec<ResultItem>,
    pub query: QueryMeta,
    pub debug: DebugInfo,
}

/// Query metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryMeta {
    /// Original query string.
    pub original: String,
    /// Mode the query ran in.
    pub mode: String,
}

/// Debug information.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DebugInfo {
    /// Cache hit status.
    pub cache_hit: bool,
}

/// Implementation of the search tool.
pub async fn search_impl(state: &AppState, params: SearchParams) -> Result<CallToolResult, McpError> {
    let mode: SearchMode = params.mode.parse().map_err(Error::from)?;
    let req = SearchRequest { query: params.query.clone(), mode, limit: state.config.search_limit };
    req.validate().map_err(Error::from)?;

    let cache_key = compute_search_key(mode.as_str(), &params.query);
    let now = state.clock.now();

    if !params.force_refresh
        && let Ok(Some(cached_json)) = state.db.get_search(&cache_key, now).await
        && let Ok(mut cached) = serde_json::from_str::<SearchOutput>(&cached_json)
    {
        tracing::debug!(query = %params.query, %mode, "search cache hit");
        cached.debug.cache_hit = true;
        return json_result(&cached);
    }

    let results = state.search.search_items(&req).await?;
    let output = SearchOutput {
        results,
        query: QueryMeta { original: params.query.clone(), mode: mode.to_string() },
        debug: DebugInfo { cache_hit: false },
    };

    match state.policy.next_invalidation(now) {
        Some(expires_at) => {
            if let Err(e) = state.db.purge_expired_search(now).await {
                tracing::warn!(error = %e, "failed to purge expired searches");
            }
            let query_json = serde_json::to_string(&params.query).unwrap_or_default();
            let response_json = serde_json::to_string(&output).unwrap_or_default();
            if let Err(e) = state
                .db
                .put_search(&cache_key, &query_json, &response_json, now, expires_at)
                .await
            {
                tracing::warn!(error = %e, "failed to cache search result");
            }
        }
        None => tracing::debug!("inside the invalidation window; search result not cached"),
    }

    json_result(&output)
}
