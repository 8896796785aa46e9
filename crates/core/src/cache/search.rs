//! Search cache operations.
//!
//! Search results are cached until the next daily invalidation. Timestamps
//! are stored as fixed-width local times so that string comparison in SQL
//! orders them correctly.

use super::connection::CacheDb;
use crate::Error;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn format_ts(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Cached search result metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchCacheMeta {
    pub query_json: String,
    pub fetched_at: String,
    pub expires_at: String,
}

impl CacheDb {
    /// Get a cached search response by key hash, if it has not expired at `now`.
    pub async fn get_search(&self, key_hash: &str, now: NaiveDateTime) -> Result<Option<String>, Error> {
        let key_hash = key_hash.to_string();
        let now = format_ts(now);
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let mut stmt =
                    conn.prepare("SELECT response_json FROM search_cache WHERE key_hash = ?1 AND expires_at > ?2")?;

                let result = stmt.query_row(params![key_hash, now], |row| row.get(0));

                match result {
                    Ok(json) => Ok(Some(json)),
                    Err(tokio_rusqlite::rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get search cache metadata by key hash, expired or not.
    pub async fn get_search_meta(&self, key_hash: &str) -> Result<Option<SearchCacheMeta>, Error> {
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<SearchCacheMeta>, Error> {
                let mut stmt =
                    conn.prepare("SELECT query_json, fetched_at, expires_at FROM search_cache WHERE key_hash = ?1")?;

                let result = stmt.query_row(params![key_hash], |row| {
                    Ok(SearchCacheMeta { query_json: row.get(0)?, fetched_at: row.get(1)?, expires_at: row.get(2)? })
                });

                match result {
                    Ok(meta) => Ok(Some(meta)),
                    Err(tokio_rusqlite::rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or update a cached search result.
    ///
    /// Uses UPSERT semantics: inserts if the key doesn't exist, updates all fields if it does.
    pub async fn put_search(
        &self, key_hash: &str, query_json: &str, response_json: &str, fetched_at: NaiveDateTime,
        expires_at: NaiveDateTime,
    ) -> Result<(), Error> {
        let key_hash = key_hash.to_string();
        let query_json = query_json.to_string();
        let response_json = response_json.to_string();
        let fetched_at = format_ts(fetched_at);
        let expires_at = format_ts(expires_at);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO search_cache (key_hash, query_json, response_json, fetched_at, expires_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(key_hash) DO UPDATE SET
                        query_json = excluded.query_json,
                        response_json = excluded.response_json,
                        fetched_at = excluded.fetched_at,
                        expires_at = excluded.expires_at",
                    params![key_hash, query_json, response_json, fetched_at, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete search cache entries that expired at or before `now`.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_expired_search(&self, now: NaiveDateTime) -> Result<u64, Error> {
        let now = format_ts(now);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM search_cache WHERE expires_at <= ?1", params![now])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete every search cache entry.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_all_search(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM search_cache", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_put_and_get_search() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = "test_key_hash";
        let response_json = r#"{"results":[]}"#;

        db.put_search(key, r#""governo""#, response_json, at(2, 9), at(3, 5)).await.unwrap();

        let retrieved = db.get_search(key, at(2, 10)).await.unwrap().unwrap();
        assert_eq!(retrieved, response_json);
    }

    #[tokio::test]
    async fn test_get_missing_search() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.get_search("nonexistent", at(2, 10)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_expired_search_is_not_returned() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_search("k", "{}", "{}", at(2, 9), at(3, 5)).await.unwrap();

        assert!(db.get_search("k", at(3, 4)).await.unwrap().is_some());
        assert!(db.get_search("k", at(3, 5)).await.unwrap().is_none());

        let meta = db.get_search_meta("k").await.unwrap().unwrap();
        assert_eq!(meta.expires_at, "2024-05-03T05:00:00");
        assert_eq!(meta.fetched_at, "2024-05-02T09:00:00");
    }

    #[tokio::test]
    async fn test_purge_expired_search() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_search("expiring", "{}", "{}", at(1, 9), at(2, 5)).await.unwrap();
        db.put_search("fresh", "{}", "{}", at(2, 9), at(3, 5)).await.unwrap();

        let deleted = db.purge_expired_search(at(2, 10)).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(db.get_search_meta("expiring").await.unwrap().is_none());
        assert!(db.get_search("fresh", at(2, 10)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_all_search() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_search("a", "{}", "{}", at(2, 9), at(3, 5)).await.unwrap();
        db.put_search("b", "{}", "{}", at(2, 9), at(3, 5)).await.unwrap();

        assert_eq!(db.purge_all_search().await.unwrap(), 2);
        assert!(db.get_search("a", at(2, 10)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_search() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let key = "upsert_test";

        db.put_search(key, r#"{"old":1}"#, r#"{"old":1}"#, at(2, 9), at(3, 5)).await.unwrap();
        db.put_search(key, r#"{"new":2}"#, r#"{"new":2}"#, at(2, 10), at(3, 5)).await.unwrap();

        let retrieved = db.get_search(key, at(2, 11)).await.unwrap().unwrap();
        assert_eq!(retrieved, r#"{"new":2}"#);
    }
}
