//! Stored response entries within a generation.
//!
//! Entries are replaced whole on every write; there are no partial updates.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response.
///
/// Carries everything needed to replay the response to a caller: status,
/// headers and body, plus the request identity it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub cache_key: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    /// Response headers as a JSON array of `[name, value]` pairs.
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CachedResponse {
    #[cfg(test)]
    pub(crate) fn test_entry(url: &str, body: &[u8]) -> Self {
        Self {
            cache_key: super::hash::compute_cache_key("GET", url),
            method: "GET".into(),
            url: url.into(),
            status_code: 200,
            content_type: Some("text/html".into()),
            headers_json: None,
            body: body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

const UPSERT_ENTRY: &str = "INSERT INTO entries (
        generation, cache_key, method, url, status_code,
        content_type, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(generation, cache_key) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        status_code = excluded.status_code,
        content_type = excluded.content_type,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

pub(super) fn upsert(conn: &rusqlite::Connection, generation: &str, entry: &CachedResponse) -> rusqlite::Result<usize> {
    conn.execute(
        UPSERT_ENTRY,
        params![
            generation,
            &entry.cache_key,
            &entry.method,
            &entry.url,
            entry.status_code,
            &entry.content_type,
            &entry.headers_json,
            &entry.body,
            &entry.stored_at,
        ],
    )
}

impl CacheDb {
    /// Look up an entry by cache key within one generation.
    ///
    /// Returns None if the generation or the key doesn't exist.
    pub async fn match_entry(&self, generation: &str, cache_key: &str) -> Result<Option<CachedResponse>, Error> {
        let generation = generation.to_string();
        let cache_key = cache_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT cache_key, method, url, status_code, content_type, headers_json, body, stored_at
                    FROM entries WHERE generation = ?1 AND cache_key = ?2",
                )?;

                let result = stmt.query_row(params![generation, cache_key], |row| {
                    Ok(CachedResponse {
                        cache_key: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        status_code: row.get(3)?,
                        content_type: row.get(4)?,
                        headers_json: row.get(5)?,
                        body: row.get(6)?,
                        stored_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry.
    ///
    /// The generation must already exist; writing into a reaped generation
    /// fails on the foreign key rather than resurrecting it.
    pub async fn put_entry(&self, generation: &str, entry: &CachedResponse) -> Result<(), Error> {
        let generation = generation.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                upsert(conn, &generation, &entry)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace a batch of entries in a single transaction.
    ///
    /// Either every entry is stored or none is.
    pub async fn put_entries(&self, generation: &str, entries: &[CachedResponse]) -> Result<(), Error> {
        let generation = generation.to_string();
        let entries = entries.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    upsert(&tx, &generation, entry)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored in a generation.
    pub async fn count_entries(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
