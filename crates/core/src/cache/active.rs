//! Which version controls clients.
//!
//! Activation records its generation pair here before reaping. Write-backs
//! check the record inside the write transaction, so a version that has been
//! superseded can never write into the store again.

use super::connection::CacheDb;
use super::entries::{CachedResponse, upsert};
use super::generations::GenerationKind;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, TransactionBehavior};

/// Generation pair of the version that last activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActiveVersion {
    pub static_cache: String,
    pub runtime_cache: String,
    pub activated_at: String,
}

impl ActiveVersion {
    /// Whether this record names the given generation pair.
    pub fn is(&self, static_cache: &str, runtime_cache: &str) -> bool {
        self.static_cache == static_cache && self.runtime_cache == runtime_cache
    }
}

fn read_active(conn: &rusqlite::Connection) -> rusqlite::Result<Option<ActiveVersion>> {
    let result = conn.query_row(
        "SELECT static_cache, runtime_cache, activated_at FROM active_version WHERE id = 1",
        [],
        |row| Ok(ActiveVersion { static_cache: row.get(0)?, runtime_cache: row.get(1)?, activated_at: row.get(2)? }),
    );

    match result {
        Ok(active) => Ok(Some(active)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

impl CacheDb {
    /// Record a generation pair as the one controlling clients.
    pub async fn set_active_version(&self, static_cache: &str, runtime_cache: &str) -> Result<(), Error> {
        let static_cache = static_cache.to_string();
        let runtime_cache = runtime_cache.to_string();
        let activated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO active_version (id, static_cache, runtime_cache, activated_at)
                    VALUES (1, ?1, ?2, ?3)
                    ON CONFLICT(id) DO UPDATE SET
                        static_cache = excluded.static_cache,
                        runtime_cache = excluded.runtime_cache,
                        activated_at = excluded.activated_at",
                    params![static_cache, runtime_cache, activated_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// The version that last activated, if any has.
    pub async fn active_version(&self) -> Result<Option<ActiveVersion>, Error> {
        self.conn
            .call(|conn| -> Result<Option<ActiveVersion>, Error> { Ok(read_active(conn)?) })
            .await
            .map_err(Error::from)
    }

    /// Store an entry on behalf of the version owning `static_cache` and
    /// `runtime_cache`, unless another version has activated since.
    ///
    /// The entry goes to the generation matching `kind`. A runtime generation
    /// is created on first write; a static one must already exist. Returns
    /// false, writing nothing, when a different version is active.
    pub async fn put_entry_if_active(
        &self, static_cache: &str, runtime_cache: &str, kind: GenerationKind, entry: &CachedResponse,
    ) -> Result<bool, Error> {
        let static_cache = static_cache.to_string();
        let runtime_cache = runtime_cache.to_string();
        let entry = entry.clone();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                if read_active(&tx)?.is_some_and(|active| !active.is(&static_cache, &runtime_cache)) {
                    return Ok(false);
                }

                let generation = match kind {
                    GenerationKind::Static => &static_cache,
                    GenerationKind::Runtime => {
                        tx.execute(
                            "INSERT INTO generations (name, kind, created_at) VALUES (?1, ?2, ?3)
                            ON CONFLICT(name) DO NOTHING",
                            params![&runtime_cache, kind.as_str(), &created_at],
                        )?;
                        &runtime_cache
                    }
                };

                upsert(&tx, generation, &entry)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }
}
