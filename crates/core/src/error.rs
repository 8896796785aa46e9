//! Unified error types for the copertine cache.
//!
//! Every variant renders with a stable code prefix so that callers of the MCP
//! tools can tell a failed fetch apart from an empty result set.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the copertine server.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty query).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The external store call failed.
    #[error("FETCH_FAILED: {0}")]
    Fetch(String),

    /// The external store did not answer in time.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// The external store answered with data we could not interpret.
    #[error("MALFORMED_RESPONSE: {0}")]
    MalformedResponse(String),

    /// The external store rejected our credentials.
    #[error("STORE_AUTH_ERROR: {0}")]
    StoreAuth(String),

    /// Persisted state could not be read or parsed.
    #[error("PERSISTENCE_ERROR: {0}")]
    Persistence(String),

    /// A background prefetch step failed.
    #[error("PREFETCH_FAILED: offset {offset}: {reason}")]
    Prefetch { offset: u64, reason: String },

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Whether this error came from the external store boundary.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Error::Fetch(_) | Error::FetchTimeout(_) | Error::MalformedResponse(_) | Error::StoreAuth(_)
        )
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::Fetch(msg) => (-32000, msg.clone()),
            Error::FetchTimeout(msg) => (-32006, msg.clone()),
            Error::MalformedResponse(msg) => (-32003, msg.clone()),
            Error::StoreAuth(msg) => (-32009, msg.clone()),
            Error::Persistence(msg) => (-32004, msg.clone()),
            Error::Prefetch { .. } => (-32005, err.to_string()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
