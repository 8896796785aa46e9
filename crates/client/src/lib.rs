//! Client code for the copertine archive server.
//!
//! This crate provides the GraphQL store client that backs the page cache
//! and the search tool, plus the HTTP asset preloader used when media live
//! behind a URL.

pub mod preload;
pub mod store;

pub use preload::HttpPreloader;
pub use store::{SearchMode, SearchRequest, SearchSource, StoreClient, StoreConfig, StoreError};
