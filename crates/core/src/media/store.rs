//! Persistence for the media path mapping.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{CacheDb, Error};

/// Key under which [`SqliteMappingStore`] keeps its JSON blob.
pub const MEDIA_STATE_KEY: &str = "media_paths";

/// The persisted form of the resolver's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSnapshot {
    #[serde(default)]
    pub paths: HashMap<String, String>,
    #[serde(default)]
    pub last_refresh: Option<NaiveDateTime>,
}

impl MediaSnapshot {
    fn decode(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::Persistence(format!("media mapping: {e}")))
    }

    fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Persistence(format!("media mapping: {e}")))
    }
}

/// Load/save seam for the media mapping.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// The stored snapshot, `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// `Error::Persistence` when the stored data cannot be parsed.
    async fn load(&self) -> Result<Option<MediaSnapshot>, Error>;

    async fn save(&self, snapshot: &MediaSnapshot) -> Result<(), Error>;
}

/// Keeps the mapping as a JSON value in the cache database.
#[derive(Debug, Clone)]
pub struct SqliteMappingStore {
    db: CacheDb,
}

impl SqliteMappingStore {
    pub fn new(db: CacheDb) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn load(&self) -> Result<Option<MediaSnapshot>, Error> {
        match self.db.get_state(MEDIA_STATE_KEY).await? {
            Some(raw) => MediaSnapshot::decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &MediaSnapshot) -> Result<(), Error> {
        self.db.put_state(MEDIA_STATE_KEY, &snapshot.encode()?).await
    }
}

/// In-process store, mainly for tests. Holds the encoded JSON so that
/// decoding behaves exactly like the database-backed store.
#[derive(Debug, Default)]
pub struct MemoryMappingStore {
    raw: Mutex<Option<String>>,
    saves: AtomicUsize,
}

impl MemoryMappingStore {
    /// A store pre-filled with arbitrary (possibly invalid) data.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { raw: Mutex::new(Some(raw.into())), saves: AtomicUsize::new(0) }
    }

    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MappingStore for MemoryMappingStore {
    async fn load(&self) -> Result<Option<MediaSnapshot>, Error> {
        self.raw().as_deref().map(MediaSnapshot::decode).transpose()
    }

    async fn save(&self, snapshot: &MediaSnapshot) -> Result<(), Error> {
        let encoded = snapshot.encode()?;
        *self.raw.lock().unwrap_or_else(|e| e.into_inner()) = Some(encoded);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
