//! GraphQL store client.
//!
//! Talks to the vector/search store that holds the daily items.
//!
//! ### Specification
//!
//! - **Endpoint**: `POST {base_url}/v1/graphql` with a `{"query": ...}` body.
//! - **Authentication**: optional `Authorization: Bearer <key>` header.
//! - **Listing**: one request carries both the sorted page (`Get`) and the
//!   collection total (`Aggregate`), so a page and its total always agree.
//! - **Search**: `bm25` for literal mode, `nearText` for fuzzy mode.
//! - **Errors**: GraphQL `errors` and transport failures surface as
//!   [`StoreError`], which converts into the core fetch errors.

pub mod error;
pub mod request;
pub mod response;

pub use error::StoreError;
pub use request::{SearchMode, SearchRequest};
pub use response::GraphQlResponse;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use copertine_core::{AppConfig, Error, Page, PageSource, ResultItem};
use reqwest::header;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "copertine/0.1";

/// Store client configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL, without the `/v1/graphql` suffix.
    pub base_url: String,
    /// Bearer token, if the store requires one.
    pub api_key: Option<String>,
    /// Collection (GraphQL class) holding the items.
    pub collection: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            collection: "Copertine".to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl From<&AppConfig> for StoreConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.store_url.clone(),
            api_key: config.store_api_key.clone().filter(|key| !key.is_empty()),
            collection: config.collection.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Client for the GraphQL store.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    config: Arc<StoreConfig>,
    endpoint: String,
}

impl StoreClient {
    /// Create a new store client with the given configuration.
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        if !request::is_valid_collection(&config.collection) {
            return Err(StoreError::InvalidQuery(format!("invalid collection name: {:?}", config.collection)));
        }

        let base = url::Url::parse(&config.base_url)
            .map_err(|e| StoreError::InvalidQuery(format!("invalid store URL {:?}: {e}", config.base_url)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(StoreError::InvalidQuery(format!("unsupported store URL scheme: {}", base.scheme())));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| StoreError::Network(Arc::new(e)))?;

        let endpoint = format!("{}/v1/graphql", config.base_url.trim_end_matches('/'));
        Ok(Self { http, config: Arc::new(config), endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn collection(&self) -> &str {
        &self.config.collection
    }

    /// Fetch one page of the listing, newest first.
    pub async fn list_page(&self, offset: u64, limit: u32) -> Result<Page, StoreError> {
        request::validate_limit(limit)?;

        let start = Instant::now();
        let collection = self.collection();
        let data = self.query(request::page_graphql(collection, offset, limit)).await?;
        let page = data.into_page(collection, offset, limit)?;

        tracing::debug!(
            offset,
            limit,
            items = page.items.len(),
            total = page.pagination.total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "listing page fetched"
        );
        Ok(page)
    }

    /// Execute a search query.
    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<ResultItem>, StoreError> {
        req.validate()?;

        let start = Instant::now();
        let mut data = self.query(req.to_graphql(self.collection())).await?;
        let items = data.items(self.collection())?;

        tracing::debug!(
            mode = %req.mode,
            results = items.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search completed"
        );
        Ok(items)
    }

    async fn query(&self, query: String) -> Result<response::GraphQlData, StoreError> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .json(&serde_json::json!({ "query": query }));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let http_response = builder.send().await?;
        let status = http_response.status();
        tracing::trace!(%status, "store response");

        if status == 401 || status == 403 {
            return Err(StoreError::Auth { status: status.as_u16() });
        }

        if status.is_client_error() || status.is_server_error() {
            return Err(StoreError::HttpError { status: status.as_u16() });
        }

        let bytes = http_response.bytes().await?;
        let parsed: GraphQlResponse =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed(e.to_string()))?;
        parsed.into_data()
    }
}

/// Seam over [`StoreClient::search`] so callers can be tested without a store.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search_items(&self, req: &SearchRequest) -> Result<Vec<ResultItem>, Error>;
}

#[async_trait]
impl SearchSource for StoreClient {
    async fn search_items(&self, req: &SearchRequest) -> Result<Vec<ResultItem>, Error> {
        Ok(self.search(req).await?)
    }
}

#[async_trait]
impl PageSource for StoreClient {
    async fn fetch_page(&self, offset: u64, limit: u32) -> Result<Page, Error> {
        Ok(self.list_page(offset, limit).await?)
    }
}
