//! Paged listing cache.
//!
//! Pages of the archive listing are cached in memory, one [`CacheEntry`] per
//! offset. Freshness is decided by the [`SchedulePolicy`](crate::SchedulePolicy);
//! a background sweep keeps the leading pages warm.

mod cache;
mod sweep;

pub use cache::{Cleared, EntryStatus, PageCache, PageCacheConfig, PageHit};
pub use sweep::SweepReport;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// One published item as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    /// Unique identifier of the edition.
    pub edition_id: String,
    /// Publication date.
    pub date: NaiveDate,
    /// Caption text.
    pub caption: String,
    /// Secondary (kicker) text.
    pub kicker: String,
    /// Stable media filename.
    pub filename: String,
    /// Name of the publication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<String>,
}

/// Position of a page within the full listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub total: u64,
    pub offset: u64,
    pub limit: u32,
    pub has_more: bool,
}

impl PaginationInfo {
    pub fn new(total: u64, offset: u64, limit: u32) -> Self {
        Self { total, offset, limit, has_more: offset.saturating_add(u64::from(limit)) < total }
    }
}

/// Result of one fetch: the items and where they sit in the listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Page {
    pub items: Vec<ResultItem>,
    pub pagination: PaginationInfo,
}

impl Page {
    pub fn new(items: Vec<ResultItem>, total: u64, offset: u64, limit: u32) -> Self {
        Self { items, pagination: PaginationInfo::new(total, offset, limit) }
    }

    /// A page with no items. `total = 0` is a valid answer, not an error.
    pub fn empty(offset: u64, limit: u32) -> Self {
        Self::new(Vec::new(), 0, offset, limit)
    }
}

/// A cached page together with the time of the fetch that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub page: Page,
    pub fetched_at: NaiveDateTime,
}

/// The fetch function behind the page cache.
///
/// Implementations own their retry and timeout policy; the cache treats
/// every error the same way.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, offset: u64, limit: u32) -> Result<Page, Error>;
}
