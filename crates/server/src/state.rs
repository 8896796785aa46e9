//! Shared state handed to every tool.
//!
//! Built once in `main` and shared by `Arc`; the page cache and media
//! resolver own their background tasks.

use std::sync::Arc;

use copertine_client::SearchSource;
use copertine_core::{AppConfig, CacheDb, Clock, MediaResolver, PageCache, SchedulePolicy};

pub struct AppState {
    pub config: AppConfig,
    pub policy: SchedulePolicy,
    pub clock: Arc<dyn Clock>,
    pub db: CacheDb,
    pub pages: Arc<PageCache>,
    pub media: Arc<MediaResolver>,
    pub search: Arc<dyn SearchSource>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pages", &self.pages)
            .field("media", &self.media)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory state with scriptable store fakes.

    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveDateTime};
    use copertine_client::SearchRequest;
    use copertine_core::media::MemoryMappingStore;
    use copertine_core::{
        Error, ManualClock, MediaResolverConfig, Page, PageCacheConfig, PageSource, PrefetchQueue, ResultItem,
    };
    use rmcp::model::CallToolResult;
    use serde::de::DeserializeOwned;

    use super::*;

    pub fn item(id: &str) -> ResultItem {
        ResultItem {
            edition_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            caption: format!("caption {id}"),
            kicker: format!("kicker {id}"),
            filename: format!("{id}.jpg"),
            publication: Some("Il Manifesto".to_string()),
        }
    }

    pub fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    /// Listing with `total` items; offsets in `failing` return a fetch error.
    pub struct FakeStore {
        pub total: u64,
        pub page_calls: AtomicUsize,
        pub search_calls: AtomicUsize,
        pub failing: Mutex<HashSet<u64>>,
    }

    impl FakeStore {
        pub fn new(total: u64) -> Self {
            Self {
                total,
                page_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
                failing: Mutex::new(HashSet::new()),
            }
        }

        pub fn page_calls(&self) -> usize {
            self.page_calls.load(Ordering::SeqCst)
        }

        pub fn search_calls(&self) -> usize {
            self.search_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageSource for FakeStore {
        async fn fetch_page(&self, offset: u64, limit: u32) -> Result<Page, Error> {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.lock().unwrap().contains(&offset) {
                return Err(Error::Fetch(format!("store unavailable at offset {offset}")));
            }
            let end = offset.saturating_add(u64::from(limit)).min(self.total);
            let items = (offset..end).map(|i| item(&format!("e{i}"))).collect();
            Ok(Page::new(items, self.total, offset, limit))
        }
    }

    #[async_trait]
    impl SearchSource for FakeStore {
        async fn search_items(&self, req: &SearchRequest) -> Result<Vec<ResultItem>, Error> {
            let n = self.search_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![item(&format!("{}-{}-{n}", req.mode, req.query.trim()))])
        }
    }

    pub struct TestEnv {
        pub state: Arc<AppState>,
        pub store: Arc<FakeStore>,
        pub clock: Arc<ManualClock>,
        pub queue: PrefetchQueue,
    }

    /// State with no sweep and no prefetch worker running.
    pub async fn env(total: u64) -> TestEnv {
        let config = AppConfig { prefetch_pages: 0, media_root: "/srv/media/".into(), ..Default::default() };
        let policy = config.schedule_policy().unwrap();
        let clock = Arc::new(ManualClock::new(noon()));
        let store = Arc::new(FakeStore::new(total));
        let db = CacheDb::open_in_memory().await.unwrap();

        let pages = PageCache::new(
            PageCacheConfig { page_limit: config.page_limit, prefetch_pages: config.prefetch_pages, policy },
            store.clone(),
            clock.clone(),
        );
        let (media, queue) = MediaResolver::load(
            MediaResolverConfig { media_root: config.media_root.clone(), queue_capacity: 8, policy },
            Arc::new(MemoryMappingStore::default()),
            clock.clone(),
        )
        .await;

        let state = Arc::new(AppState {
            config,
            policy,
            clock: clock.clone(),
            db,
            pages,
            media,
            search: store.clone(),
        });
        TestEnv { state, store, clock, queue }
    }

    /// Decode the JSON text content of a tool result.
    pub fn output<T: DeserializeOwned>(result: &CallToolResult) -> T {
        let content = serde_json::to_value(&result.content[0]).unwrap();
        let text = content
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content");
        serde_json::from_str(text).unwrap()
    }
}
