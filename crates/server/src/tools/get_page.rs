//! get_page tool implementation.
//!
//! Serves one page of the listing from the page cache and queues a preload
//! of the page after it.

use chrono::NaiveDateTime;
use copertine_core::{Error, PaginationInfo, ResultItem};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::AppState;

/// Input parameters for get_page tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetPageParams {
    /// Index of the first item (default 0).
    #[serde(default)]
    pub offset: u64,

    /// Items per page (1-100). Defaults to the configured page size; any
    /// other value is fetched directly and not cached.
    #[serde(default)]
    pub limit: Option<u32>,

    /// Queue a background preload of the next page (default true).
    #[serde(default = "default_true")]
    pub prefetch_next: bool,
}

fn default_true() -> bool {
    true
}

/// Output structure for get_page tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetPageOutput {
    pub items: Vec<ResultItem>,
    pub pagination: PaginationInfo,
    /// True when the page came from the cache without a store round trip.
    pub served_from_cache: bool,
    /// When the served page was fetched from the store, if it was cached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<NaiveDateTime>,
    /// Whether a preload of the next page was queued by this call.
    pub prefetch_enqueued: bool,
}

/// Implementation of the get_page tool.
pub async fn get_page_impl(state: &AppState, params: GetPageParams) -> Result<CallToolResult, McpError> {
    let page_limit = state.pages.page_limit();
    let limit = params.limit.unwrap_or(page_limit);
    if !(1..=100).contains(&limit) {
        return Err(Error::InvalidInput(format!("limit must be 1-100, got {limit}")).into());
    }

    if limit != page_limit {
        tracing::debug!(offset = params.offset, limit, "non-standard limit; bypassing page cache");
        let page = state.pages.fetch_uncached(params.offset, limit).await?;
        let output = GetPageOutput {
            items: page.items,
            pagination: page.pagination,
            served_from_cache: false,
            fetched_at: None,
            prefetch_enqueued: false,
        };
        return json_result(&output);
    }

    let hit = state.pages.get(params.offset).await?;
    let page = &hit.entry.page;

    let prefetch_enqueued = params.prefetch_next
        && page.pagination.has_more
        && state.media.prefetch_next_page(params.offset).await;

    let output = GetPageOutput {
        items: page.items.clone(),
        pagination: page.pagination,
        served_from_cache: hit.from_cache,
        fetched_at: Some(hit.entry.fetched_at),
        prefetch_enqueued,
    };
    json_result(&output)
}
