//! SQLite-backed persistence for search results and resolver state.
//!
//! The in-memory page cache is the hot path; this database only keeps data
//! that is worth carrying across restarts:
//!
//! - Search responses, keyed by a SHA-256 of mode and query
//! - Small JSON blobs of process state (the media path mapping)
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod search;
pub mod state;

pub use crate::Error;

pub use connection::CacheDb;
pub use search::SearchCacheMeta;
