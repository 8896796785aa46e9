//! MCP tool implementations.
//!
//! This module contains all tools exposed by the copertine server.

pub mod cache;
pub mod get_page;
pub mod media;
pub mod search;

pub use cache::{CacheStatusParams, InvalidateAllParams};
pub use get_page::GetPageParams;
pub use media::{GetMediaPathParams, PrefetchNextPageParams};
pub use search::SearchParams;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use copertine_core::Error;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
