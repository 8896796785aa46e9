//! Store client error types.

use std::sync::Arc;

use copertine_core::Error;

/// Errors from the GraphQL store client.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Invalid search query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Unknown search mode.
    #[error("invalid mode: {0:?} (expected \"literal\" or \"fuzzy\")")]
    InvalidMode(String),

    /// Invalid result limit (must be 1-100).
    #[error("invalid limit: must be 1-100")]
    InvalidLimit,

    /// The store answered with GraphQL errors.
    #[error("query rejected: {0}")]
    GraphQl(String),

    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Authentication failed (missing or invalid API key).
    #[error("authentication failed: status {status}")]
    Auth { status: u16 },

    /// HTTP error response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { StoreError::Timeout } else { StoreError::Network(Arc::new(err)) }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidQuery(_) | StoreError::InvalidMode(_) | StoreError::InvalidLimit => {
                Error::InvalidInput(err.to_string())
            }
            StoreError::Malformed(_) => Error::MalformedResponse(err.to_string()),
            StoreError::Auth { .. } => Error::StoreAuth(err.to_string()),
            StoreError::Timeout => Error::FetchTimeout(err.to_string()),
            StoreError::GraphQl(_) | StoreError::HttpError { .. } | StoreError::Network(_) => {
                Error::Fetch(err.to_string())
            }
        }
    }
}
