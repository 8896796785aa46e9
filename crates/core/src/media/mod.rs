//! Media path resolution and next-page asset prefetch.
//!
//! Paths are a pure function of the filename, memoized in a small mapping
//! that is persisted through a [`MappingStore`]. The mapping is reset once a
//! day (after the invalidation window opens) to bound its growth.
//!
//! Prefetch requests go through a bounded queue. The caller only marks the
//! offset and enqueues it; a worker task fetches the following page and
//! preloads its assets. An offset is enqueued at most once until the daily
//! reset, an explicit [`clear`](MediaResolver::clear) or a failed attempt.

mod preload;
mod store;

pub use preload::{AssetPreloader, LocalPreloader};
pub use store::{MEDIA_STATE_KEY, MappingStore, MediaSnapshot, MemoryMappingStore, SqliteMappingStore};

use std::collections::HashSet;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDateTime;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::{Clock, Error, PageCache, SchedulePolicy};

/// Settings for a [`MediaResolver`].
#[derive(Debug, Clone)]
pub struct MediaResolverConfig {
    pub media_root: String,
    pub queue_capacity: usize,
    pub policy: SchedulePolicy,
}

/// Receiving half of the prefetch queue, consumed by
/// [`MediaResolver::spawn_worker`].
#[derive(Debug)]
pub struct PrefetchQueue(mpsc::Receiver<u64>);

/// Filename → path resolver with a deduplicating prefetch queue.
pub struct MediaResolver {
    root: String,
    policy: SchedulePolicy,
    clock: Arc<dyn Clock>,
    store: Arc<dyn MappingStore>,
    state: RwLock<MediaSnapshot>,
    persist_lock: Mutex<()>,
    prefetched: Mutex<HashSet<u64>>,
    queue: mpsc::Sender<u64>,
    resolutions: AtomicU64,
}

impl std::fmt::Debug for MediaResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaResolver").field("root", &self.root).finish_non_exhaustive()
    }
}

impl MediaResolver {
    /// Build a resolver, restoring whatever mapping the store holds.
    ///
    /// Unreadable persisted data is logged and discarded. Restored entries
    /// that do not match the current media root are dropped.
    pub async fn load(
        config: MediaResolverConfig, store: Arc<dyn MappingStore>, clock: Arc<dyn Clock>,
    ) -> (Arc<Self>, PrefetchQueue) {
        let root = config.media_root.trim_end_matches('/').to_string();

        let mut snapshot = match store.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => MediaSnapshot::default(),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable media path mapping");
                MediaSnapshot::default()
            }
        };
        let restored = snapshot.paths.len();
        snapshot.paths.retain(|filename, path| *path == join(&root, filename));
        if restored > 0 {
            tracing::info!(restored, kept = snapshot.paths.len(), "restored media path mapping");
        }

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let resolver = Arc::new(Self {
            root,
            policy: config.policy,
            clock,
            store,
            state: RwLock::new(snapshot),
            persist_lock: Mutex::new(()),
            prefetched: Mutex::new(HashSet::new()),
            queue: tx,
            resolutions: AtomicU64::new(0),
        });
        (resolver, PrefetchQueue(rx))
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Number of paths computed (not served from the mapping) so far.
    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub async fn known_paths(&self) -> usize {
        self.state.read().await.paths.len()
    }

    pub async fn last_refresh(&self) -> Option<NaiveDateTime> {
        self.state.read().await.last_refresh
    }

    pub async fn is_prefetched(&self, offset: u64) -> bool {
        self.prefetched.lock().await.contains(&offset)
    }

    /// Path of the asset named `filename`.
    pub async fn resolve(&self, filename: &str) -> String {
        let mut changed = self.roll_over(self.clock.now()).await;

        let cached = self.state.read().await.paths.get(filename).cloned();
        let path = match cached {
            Some(path) => path,
            None => match self.state.write().await.paths.entry(filename.to_string()) {
                Entry::Occupied(slot) => slot.get().clone(),
                Entry::Vacant(slot) => {
                    self.resolutions.fetch_add(1, Ordering::Relaxed);
                    changed = true;
                    slot.insert(join(&self.root, filename)).clone()
                }
            },
        };

        if changed {
            self.persist().await;
        }
        path
    }

    /// Queue a preload of the page after `current_offset`.
    ///
    /// Returns `true` if a request was enqueued, `false` if this offset was
    /// already handled or the queue is full.
    pub async fn prefetch_next_page(&self, current_offset: u64) -> bool {
        if self.roll_over(self.clock.now()).await {
            self.persist().await;
        }

        if !self.prefetched.lock().await.insert(current_offset) {
            tracing::trace!(current_offset, "next page already prefetched");
            return false;
        }

        match self.queue.try_send(current_offset) {
            Ok(()) => true,
            Err(e) => {
                self.prefetched.lock().await.remove(&current_offset);
                tracing::debug!(current_offset, error = %e, "prefetch queue unavailable");
                false
            }
        }
    }

    /// Forget every path and prefetched offset.
    pub async fn clear(&self) {
        {
            let mut state = self.state.write().await;
            state.paths.clear();
            state.last_refresh = Some(self.clock.now());
        }
        self.prefetched.lock().await.clear();
        self.persist().await;
        tracing::info!("media path mapping cleared");
    }

    /// Start the task that drains the prefetch queue.
    pub fn spawn_worker(
        self: &Arc<Self>, queue: PrefetchQueue, cache: Arc<PageCache>, preloader: Arc<dyn AssetPreloader>,
    ) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        let PrefetchQueue(mut rx) = queue;
        tokio::spawn(async move {
            while let Some(offset) = rx.recv().await {
                match resolver.prefetch_after(offset, &cache, &preloader).await {
                    Ok(preloads) => tracing::debug!(offset, preloads, "prefetched next page"),
                    Err(e) => {
                        tracing::warn!(error = %e, "media prefetch failed");
                        resolver.prefetched.lock().await.remove(&offset);
                    }
                }
            }
            tracing::debug!("media prefetch queue closed");
        })
    }

    async fn prefetch_after(
        &self, offset: u64, cache: &PageCache, preloader: &Arc<dyn AssetPreloader>,
    ) -> Result<usize, Error> {
        if let Some(current) = cache.peek(offset).await
            && !current.page.pagination.has_more
        {
            return Ok(0);
        }

        let Some(next) = offset.checked_add(u64::from(cache.page_limit())) else {
            tracing::debug!(offset, "no page after offset");
            return Ok(0);
        };
        let hit = cache
            .get(next)
            .await
            .map_err(|e| Error::Prefetch { offset: next, reason: e.to_string() })?;

        for item in &hit.entry.page.items {
            let path = self.resolve(&item.filename).await;
            let preloader = Arc::clone(preloader);
            tokio::spawn(async move {
                if let Err(e) = preloader.preload(&path).await {
                    tracing::debug!(path = %path, error = %e, "asset preload failed");
                }
            });
        }

        Ok(hit.entry.page.items.len())
    }

    /// Apply the daily reset if it is due. Returns whether state changed.
    async fn roll_over(&self, now: NaiveDateTime) -> bool {
        let mut state = self.state.write().await;
        if !self.policy.needs_global_refresh(state.last_refresh, now) {
            return false;
        }

        let dropped = state.paths.len();
        state.paths.clear();
        state.last_refresh = Some(now);
        drop(state);

        self.prefetched.lock().await.clear();
        if dropped > 0 {
            tracing::info!(dropped, "daily media path reset");
        }
        true
    }

    async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.state.read().await.clone();
        if let Err(e) = self.store.save(&snapshot).await {
            tracing::warn!(error = %e, "failed to persist media path mapping");
        }
    }
}

fn join(root: &str, filename: &str) -> String {
    format!("{root}/{filename}")
}
