//! Core types and shared functionality for the copertine archive server.
//!
//! This crate provides:
//! - The daily refresh schedule and an injectable clock
//! - The paged listing cache with its background prefetch sweep
//! - Media path resolution with deduplicated next-page prefetch
//! - SQLite-backed persistence for search results and small state
//! - Unified error types and configuration

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod media;
pub mod pages;
pub mod schedule;

pub use cache::{CacheDb, SearchCacheMeta};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use media::{AssetPreloader, MappingStore, MediaResolver, MediaResolverConfig, PrefetchQueue};
pub use pages::{Page, PageCache, PageCacheConfig, PageSource, PaginationInfo, ResultItem};
pub use schedule::{ScheduleError, SchedulePolicy};
