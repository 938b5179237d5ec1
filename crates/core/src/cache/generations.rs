//! Cache generation lifecycle: open, enumerate, delete.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// What a generation holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    /// Install-time manifest plus same-origin write-backs.
    Static,
    /// Allow-listed external resources.
    Runtime,
}

impl GenerationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationKind::Static => "static",
            GenerationKind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(GenerationKind::Static),
            "runtime" => Ok(GenerationKind::Runtime),
            other => Err(Error::InvalidInput(format!("unknown generation kind: {other}"))),
        }
    }
}

/// Handle to an open generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub name: String,
    pub kind: GenerationKind,
    pub created_at: String,
}

/// Generation summary for inspection.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub kind: GenerationKind,
    pub created_at: String,
    pub entries: u64,
}

fn kind_from_row(raw: String) -> rusqlite::Result<GenerationKind> {
    raw.parse()
        .map_err(|e: Error| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))
}

impl CacheDb {
    /// Open a generation, creating it if absent.
    ///
    /// Idempotent: an existing generation is returned unchanged, including
    /// its original kind and creation time.
    pub async fn open_generation(&self, name: &str, kind: GenerationKind) -> Result<Generation, Error> {
        let name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<Generation, Error> {
                conn.execute(
                    "INSERT INTO generations (name, kind, created_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(name) DO NOTHING",
                    params![&name, kind.as_str(), &created_at],
                )?;

                let generation = conn.query_row(
                    "SELECT name, kind, created_at FROM generations WHERE name = ?1",
                    params![&name],
                    |row| {
                        Ok(Generation { name: row.get(0)?, kind: kind_from_row(row.get(1)?)?, created_at: row.get(2)? })
                    },
                )?;
                Ok(generation)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and all of its entries.
    ///
    /// Returns false if no generation had that name.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every stored generation.
    pub async fn list_generation_names(&self) -> Result<BTreeSet<String>, Error> {
        self.conn
            .call(|conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Every generation with its entry count, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.kind, g.created_at, COUNT(e.cache_key)
                    FROM generations g
                    LEFT JOIN entries e ON e.generation = g.name
                    GROUP BY g.name
                    ORDER BY g.created_at ASC, g.name ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(GenerationInfo {
                            name: row.get(0)?,
                            kind: kind_from_row(row.get(1)?)?,
                            created_at: row.get(2)?,
                            entries: row.get::<_, i64>(3)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }
}
