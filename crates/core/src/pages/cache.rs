//! In-memory page cache keyed by offset.
//!
//! Entries are stored as `Arc<CacheEntry>` and swapped whole under the write
//! lock, so a reader holds either the old entry or the new one, never a mix.
//! No lock is held while the page source is awaited.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use super::sweep::{SweepPhase, SweepReport};
use super::{CacheEntry, Page, PageSource};
use crate::{Clock, Error, SchedulePolicy};

/// Sizing and schedule for a [`PageCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCacheConfig {
    pub page_limit: u32,
    pub prefetch_pages: u32,
    pub policy: SchedulePolicy,
}

/// A page returned by [`PageCache::get`].
#[derive(Debug, Clone)]
pub struct PageHit {
    pub entry: Arc<CacheEntry>,
    /// True when no fetch was needed.
    pub from_cache: bool,
}

/// Summary of one cached offset, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EntryStatus {
    pub offset: u64,
    pub fetched_at: NaiveDateTime,
    pub items: usize,
    pub valid: bool,
}

/// Outcome of [`PageCache::clear`].
#[derive(Debug)]
pub struct Cleared {
    /// Number of entries dropped.
    pub pages: usize,
    /// The sweep started by this clear, or `None` if one was already running
    /// (it will make a trailing pass instead).
    pub sweep: Option<JoinHandle<SweepReport>>,
}

#[derive(Debug, Default)]
struct Slots {
    /// Bumped by every clear; fetches started under an older epoch are not installed.
    epoch: u64,
    entries: HashMap<u64, Arc<CacheEntry>>,
}

/// Offset-keyed cache of listing pages.
pub struct PageCache {
    config: PageCacheConfig,
    source: Arc<dyn PageSource>,
    clock: Arc<dyn Clock>,
    slots: RwLock<Slots>,
    pub(super) sweep: Mutex<SweepPhase>,
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache").field("config", &self.config).finish_non_exhaustive()
    }
}

impl PageCache {
    /// Create an empty cache without starting a sweep.
    pub fn new(config: PageCacheConfig, source: Arc<dyn PageSource>, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            config,
            source,
            clock,
            slots: RwLock::new(Slots::default()),
            sweep: Mutex::new(SweepPhase::default()),
        })
    }

    /// Create a cache and start warming its leading pages in the background.
    pub async fn spawn(config: PageCacheConfig, source: Arc<dyn PageSource>, clock: Arc<dyn Clock>) -> Arc<Self> {
        let cache = Self::new(config, source, clock);
        cache.trigger_sweep().await;
        cache
    }

    pub fn config(&self) -> &PageCacheConfig {
        &self.config
    }

    pub fn page_limit(&self) -> u32 {
        self.config.page_limit
    }

    /// Return the page at `offset`, fetching it if missing or stale.
    ///
    /// # Errors
    ///
    /// Propagates the page source's error. The previously stored entry, if
    /// any, is left in place.
    pub async fn get(&self, offset: u64) -> Result<PageHit, Error> {
        if let Some(entry) = self.fresh_entry(offset, self.clock.now()).await {
            tracing::trace!(offset, "page cache hit");
            return Ok(PageHit { entry, from_cache: true });
        }

        tracing::debug!(offset, "page cache miss");
        let (entry, _) = self
            .fetch_and_install(offset)
            .await
            .inspect_err(|e| tracing::warn!(offset, error = %e, "page fetch failed"))?;
        Ok(PageHit { entry, from_cache: false })
    }

    /// Install `page` at `offset`, stamped with the current time.
    pub async fn set(&self, offset: u64, page: Page) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry { page, fetched_at: self.clock.now() });
        self.install(offset, Arc::clone(&entry), None).await;
        entry
    }

    /// Whether a fresh entry exists at `offset`. Never fetches.
    pub async fn is_valid(&self, offset: u64) -> bool {
        self.fresh_entry(offset, self.clock.now()).await.is_some()
    }

    /// The stored entry at `offset`, fresh or not.
    pub async fn peek(&self, offset: u64) -> Option<Arc<CacheEntry>> {
        self.slots.read().await.entries.get(&offset).cloned()
    }

    /// Drop every entry and start a new sweep.
    pub async fn clear(self: &Arc<Self>) -> Cleared {
        let pages = {
            let mut slots = self.slots.write().await;
            slots.epoch += 1;
            let pages = slots.entries.len();
            slots.entries.clear();
            pages
        };
        tracing::info!(pages, "page cache cleared");

        let sweep = self.trigger_sweep().await;
        Cleared { pages, sweep }
    }

    /// Fetch a page with a non-standard limit. The result is not cached.
    pub async fn fetch_uncached(&self, offset: u64, limit: u32) -> Result<Page, Error> {
        self.source.fetch_page(offset, limit).await
    }

    /// Every stored offset with its fetch time and current validity.
    pub async fn snapshot(&self) -> Vec<EntryStatus> {
        let now = self.clock.now();
        let slots = self.slots.read().await;
        let mut status: Vec<EntryStatus> = slots
            .entries
            .iter()
            .map(|(&offset, entry)| EntryStatus {
                offset,
                fetched_at: entry.fetched_at,
                items: entry.page.items.len(),
                valid: !self.config.policy.is_stale(Some(entry.fetched_at), now),
            })
            .collect();
        status.sort_by_key(|s| s.offset);
        status
    }

    /// Fetch `offset` from the source and install the result.
    ///
    /// The entry is stamped with the time the fetch started. If a clear
    /// happened while the fetch was in flight the result is returned but
    /// not stored; the flag says whether it was stored.
    pub(super) async fn fetch_and_install(&self, offset: u64) -> Result<(Arc<CacheEntry>, bool), Error> {
        let epoch = self.slots.read().await.epoch;
        let started = self.clock.now();

        let page = self.source.fetch_page(offset, self.config.page_limit).await?;
        let entry = Arc::new(CacheEntry { page, fetched_at: started });

        let stored = self.install(offset, Arc::clone(&entry), Some(epoch)).await;
        if !stored {
            tracing::debug!(offset, "discarding page fetched before a cache clear");
        }
        Ok((entry, stored))
    }

    async fn fresh_entry(&self, offset: u64, now: NaiveDateTime) -> Option<Arc<CacheEntry>> {
        let slots = self.slots.read().await;
        slots
            .entries
            .get(&offset)
            .filter(|entry| !self.config.policy.is_stale(Some(entry.fetched_at), now))
            .cloned()
    }

    async fn install(&self, offset: u64, entry: Arc<CacheEntry>, expected_epoch: Option<u64>) -> bool {
        let mut slots = self.slots.write().await;
        if expected_epoch.is_some_and(|epoch| epoch != slots.epoch) {
            return false;
        }
        slots.entries.insert(offset, entry);
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use chrono::{NaiveDate, TimeDelta};

    use super::*;
    use crate::ManualClock;
    use crate::pages::testing::{FakeSource, item};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn config(prefetch_pages: u32) -> PageCacheConfig {
        PageCacheConfig { page_limit: 30, prefetch_pages, policy: SchedulePolicy::parse("05:00", "05:10").unwrap() }
    }

    fn setup(total: u64) -> (Arc<PageCache>, Arc<FakeSource>, Arc<ManualClock>) {
        let source = Arc::new(FakeSource::new(total));
        let clock = Arc::new(ManualClock::new(at(2, 12, 0)));
        let cache = PageCache::new(config(0), source.clone(), clock.clone());
        (cache, source, clock)
    }

    fn page_a() -> Page {
        Page::new(vec![item("A")], 1, 0, 30)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (cache, source, _clock) = setup(95);

        let first = cache.get(0).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.entry.page.items.len(), 30);
        assert_eq!(first.entry.fetched_at, at(2, 12, 0));

        let second = cache.get(0).await.unwrap();
        assert!(second.from_cache);
        assert!(Arc::ptr_eq(&first.entry, &second.entry));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_last_page_pagination() {
        let (cache, _source, _clock) = setup(95);
        let hit = cache.get(90).await.unwrap();
        assert_eq!(hit.entry.page.items.len(), 5);
        assert!(!hit.entry.page.pagination.has_more);
        assert!(cache.get(60).await.unwrap().entry.page.pagination.has_more);
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched_next_day() {
        let (cache, source, clock) = setup(95);
        cache.get(0).await.unwrap();

        clock.advance(TimeDelta::days(1));
        assert!(!cache.is_valid(0).await);

        let hit = cache.get(0).await.unwrap();
        assert!(!hit.from_cache);
        assert_eq!(hit.entry.fetched_at, at(3, 12, 0));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_window_makes_entries_stale() {
        let (cache, source, clock) = setup(95);
        clock.set(at(2, 4, 0));
        cache.set(0, page_a()).await;
        assert!(cache.is_valid(0).await);

        clock.set(at(2, 5, 5));
        assert!(!cache.is_valid(0).await);
        assert!(!cache.get(0).await.unwrap().from_cache);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_set_installs_without_fetch() {
        let (cache, source, _clock) = setup(95);
        cache.set(0, page_a()).await;

        let hit = cache.get(0).await.unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.entry.page, page_a());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_preserves_prior_data() {
        let (cache, source, clock) = setup(95);
        cache.set(0, page_a()).await;

        clock.advance(TimeDelta::days(1));
        source.fail_at(0);

        let err = cache.get(0).await.unwrap_err();
        assert!(err.is_fetch_failure());

        let stored = cache.peek(0).await.unwrap();
        assert_eq!(stored.page, page_a());
        assert_eq!(stored.fetched_at, at(2, 12, 0));
    }

    #[tokio::test]
    async fn test_failure_without_prior_entry() {
        let (cache, source, _clock) = setup(95);
        source.fail_at(0);

        assert!(cache.get(0).await.is_err());
        assert!(cache.peek(0).await.is_none());

        source.recover(0);
        assert!(cache.get(0).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_resets_visibility() {
        let (cache, source, _clock) = setup(95);
        cache.set(0, page_a()).await;

        let cleared = cache.clear().await;
        assert_eq!(cleared.pages, 1);
        if let Some(sweep) = cleared.sweep {
            sweep.await.unwrap();
        }

        let hit = cache.get(0).await.unwrap();
        assert!(!hit.from_cache);
        assert_ne!(hit.entry.page, page_a());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_in_flight_during_clear_is_not_installed() {
        let source = Arc::new(FakeSource::gated(95));
        let clock = Arc::new(ManualClock::new(at(2, 12, 0)));
        let cache = PageCache::new(config(0), source.clone(), clock);

        let pending = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get(0).await }
        });
        tokio::time::timeout(Duration::from_secs(2), async {
            while source.in_flight.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        cache.clear().await;
        source.gate.as_ref().unwrap().add_permits(1);

        let hit = pending.await.unwrap().unwrap();
        assert!(!hit.from_cache);
        assert!(cache.peek(0).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_uncached_leaves_cache_untouched() {
        let (cache, source, _clock) = setup(95);
        let page = cache.fetch_uncached(0, 10).await.unwrap();
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.pagination.limit, 10);
        assert!(cache.peek(0).await.is_none());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_reports_validity() {
        let (cache, _source, clock) = setup(95);
        cache.get(30).await.unwrap();
        cache.get(0).await.unwrap();
        clock.set(at(2, 5, 5));

        let status = cache.snapshot().await;
        assert_eq!(status.iter().map(|s| s.offset).collect::<Vec<_>>(), vec![0, 30]);
        assert!(status.iter().all(|s| !s.valid));
        assert_eq!(status[0].items, 30);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_torn_reads() {
        let (cache, _source, _clock) = setup(95);
        cache.set(0, Page::new(vec![item("w0")], 0, 0, 30)).await;

        let writers: Vec<_> = (1..=8u64)
            .map(|w| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for round in 0..50u64 {
                        let tag = w * 1000 + round;
                        let items = vec![item(&format!("w{tag}")); 3];
                        cache.set(0, Page::new(items, tag, 0, 30)).await;
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let entry = cache.get(0).await.unwrap().entry;
                        let expected = format!("w{}", entry.page.pagination.total);
                        assert!(entry.page.items.iter().all(|i| i.edition_id == expected));
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.await.unwrap();
        }
    }
}
