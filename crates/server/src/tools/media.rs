//! get_media_path and prefetch_next_page tool implementations.

use copertine_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::state::AppState;

/// Parameters for the get_media_path tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetMediaPathParams {
    /// Media filename as listed in a page item.
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetMediaPathOutput {
    pub filename: String,
    pub path: String,
}

/// Parameters for the prefetch_next_page tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrefetchNextPageParams {
    /// Offset of the page currently displayed.
    pub current_offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PrefetchNextPageOutput {
    /// False when this offset was already queued or the queue is full.
    pub enqueued: bool,
}

/// Implementation of the get_media_path tool.
pub async fn media_path_impl(state: &AppState, params: GetMediaPathParams) -> Result<CallToolResult, McpError> {
    let filename = params.filename.trim();
    if filename.is_empty() {
        return Err(Error::InvalidInput("filename cannot be empty".into()).into());
    }
    if filename.split(['/', '\\']).any(|part| part == "..") {
        return Err(Error::InvalidInput(format!("filename must not leave the media root: {filename}")).into());
    }

    let path = state.media.resolve(filename).await;
    json_result(&GetMediaPathOutput { filename: filename.to_string(), path })
}

/// Implementation of the prefetch_next_page tool.
pub async fn prefetch_impl(state: &AppState, params: PrefetchNextPageParams) -> Result<CallToolResult, McpError> {
    let enqueued = state.media.prefetch_next_page(params.current_offset).await;
    json_result(&PrefetchNextPageOutput { enqueued })
}
