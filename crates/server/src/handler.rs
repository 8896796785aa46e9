//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::state::AppState;
use crate::tools::{
    CacheStatusParams, GetMediaPathParams, GetPageParams, InvalidateAllParams, PrefetchNextPageParams, SearchParams,
    cache, get_page, media, search,
};

/// The main MCP server handler for copertine.
#[derive(Clone)]
pub struct CopertineServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl CopertineServer {
    /// Create a new server handler over shared state.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Get one page of the archive, newest first. Returns items with caption, kicker, date and media filename, plus pagination (total, offset, limit, hasMore)."
    )]
    async fn get_page(&self, params: Parameters<GetPageParams>) -> Result<CallToolResult, McpError> {
        get_page::get_page_impl(&self.state, params.0).await
    }

    #[tool(description = "Search the archive. Mode \"literal\" ranks by keywords, \"fuzzy\" by meaning.")]
    async fn search(&self, params: Parameters<SearchParams>) -> Result<CallToolResult, McpError> {
        search::search_impl(&self.state, params.0).await
    }

    #[tool(description = "Resolve a media filename to the path or URL it is served from.")]
    async fn get_media_path(&self, params: Parameters<GetMediaPathParams>) -> Result<CallToolResult, McpError> {
        media::media_path_impl(&self.state, params.0).await
    }

    #[tool(
        description = "Queue a background preload of the page after current_offset and its media. Returns immediately."
    )]
    async fn prefetch_next_page(&self, params: Parameters<PrefetchNextPageParams>) -> Result<CallToolResult, McpError> {
        media::prefetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Drop all cached pages, media paths and searches, and restart background warming.")]
    async fn invalidate_all(&self, params: Parameters<InvalidateAllParams>) -> Result<CallToolResult, McpError> {
        cache::invalidate_impl(&self.state, params.0).await
    }

    #[tool(description = "Report cached pages with fetch times and validity, schedule state and media mapping size.")]
    async fn cache_status(&self, params: Parameters<CacheStatusParams>) -> Result<CallToolResult, McpError> {
        cache::status_impl(&self.state, params.0).await
    }
}

impl ServerHandler for CopertineServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "copertine".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::env;

    #[tokio::test]
    async fn test_all_tools_registered() {
        let env = env(95).await;
        let server = CopertineServer::new(env.state);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec!["cache_status", "get_media_path", "get_page", "invalidate_all", "prefetch_next_page", "search"]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let env = env(95).await;
        let info = CopertineServer::new(env.state).get_info();
        assert_eq!(info.server_info.name, "copertine");
    }
}
