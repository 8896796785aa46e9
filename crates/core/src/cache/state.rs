//! Key-value storage for small pieces of process state.
//!
//! Values are opaque strings (JSON in practice). Parsing is left to the
//! owner of each key so that a corrupted value can be handled where its
//! meaning is known.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

impl CacheDb {
    /// Read the value stored under `key`.
    pub async fn get_state(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                match conn.query_row("SELECT value FROM kv_state WHERE key = ?1", params![key], |row| row.get(0)) {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Store `value` under `key`, replacing any previous value.
    pub async fn put_state(&self, key: &str, value: &str) -> Result<(), Error> {
        let key = key.to_string();
        let value = value.to_string();
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv_state (key, value, updated_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![key, value, updated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the value stored under `key`. Returns whether a row was deleted.
    pub async fn delete_state(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                Ok(conn.execute("DELETE FROM kv_state WHERE key = ?1", params![key])? > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete_state() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.get_state("media").await.unwrap().is_none());

        db.put_state("media", r#"{"a":1}"#).await.unwrap();
        db.put_state("media", r#"{"a":2}"#).await.unwrap();
        assert_eq!(db.get_state("media").await.unwrap().as_deref(), Some(r#"{"a":2}"#));

        assert!(db.delete_state("media").await.unwrap());
        assert!(!db.delete_state("media").await.unwrap());
        assert!(db.get_state("media").await.unwrap().is_none());
    }
}
