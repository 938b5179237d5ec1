//! Storage seam consumed by the caching proxy.
//!
//! The proxy never reaches for a global cache; it is handed an
//! `Arc<dyn CacheStore>`. `CacheDb` is the production implementation and
//! tests wrap it to inject failures.

use std::collections::BTreeSet;

use super::connection::CacheDb;
use super::entries::CachedResponse;
use super::generations::{Generation, GenerationKind};
use crate::Error;

/// Async key-value store of named generations.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a generation, creating it if absent.
    async fn open(&self, name: &str, kind: GenerationKind) -> Result<Generation, Error>;

    /// Delete a generation. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Names of all stored generations.
    async fn list_names(&self) -> Result<BTreeSet<String>, Error>;

    /// Look up a cache key in one generation.
    async fn match_entry(&self, generation: &str, cache_key: &str) -> Result<Option<CachedResponse>, Error>;

    /// Store (or replace) one entry.
    async fn put(&self, generation: &str, entry: &CachedResponse) -> Result<(), Error>;

    /// Store (or replace) one entry for the version owning `static_cache` and
    /// `runtime_cache`, in the generation matching `kind`.
    ///
    /// Returns false without writing if another version is active.
    async fn put_if_active(
        &self, static_cache: &str, runtime_cache: &str, kind: GenerationKind, entry: &CachedResponse,
    ) -> Result<bool, Error>;

    /// Store a batch of entries atomically.
    async fn put_all(&self, generation: &str, entries: &[CachedResponse]) -> Result<(), Error>;

    /// Record the version now controlling clients.
    async fn set_active(&self, static_cache: &str, runtime_cache: &str) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, name: &str, kind: GenerationKind) -> Result<Generation, Error> {
        self.open_generation(name, kind).await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_generation(name).await
    }

    async fn list_names(&self) -> Result<BTreeSet<String>, Error> {
        self.list_generation_names().await
    }

    async fn match_entry(&self, generation: &str, cache_key: &str) -> Result<Option<CachedResponse>, Error> {
        CacheDb::match_entry(self, generation, cache_key).await
    }

    async fn put(&self, generation: &str, entry: &CachedResponse) -> Result<(), Error> {
        self.put_entry(generation, entry).await
    }

    async fn put_if_active(
        &self, static_cache: &str, runtime_cache: &str, kind: GenerationKind, entry: &CachedResponse,
    ) -> Result<bool, Error> {
        self.put_entry_if_active(static_cache, runtime_cache, kind, entry).await
    }

    async fn put_all(&self, generation: &str, entries: &[CachedResponse]) -> Result<(), Error> {
        self.put_entries(generation, entries).await
    }

    async fn set_active(&self, static_cache: &str, runtime_cache: &str) -> Result<(), Error> {
        self.set_active_version(static_cache, runtime_cache).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cache_db_as_trait_object() {
        let store: Arc<dyn CacheStore> = Arc::new(CacheDb::open_in_memory().await.unwrap());
        store.open("site-v1", GenerationKind::Static).await.unwrap();
        store.set_active("site-v1", "site-runtime-v1").await.unwrap();

        let entry = CachedResponse::test_entry("https://example.com/index.html", b"<html>");
        assert!(store.put_if_active("site-v1", "site-runtime-v1", GenerationKind::Static, &entry).await.unwrap());

        let found = store.match_entry("site-v1", &entry.cache_key).await.unwrap();
        assert_eq!(found.map(|e| e.body), Some(b"<html>".to_vec()));
        assert_eq!(store.list_names().await.unwrap().into_iter().collect::<Vec<_>>(), vec!["site-v1"]);

        let replaced = CachedResponse { body: b"<html>v2".to_vec(), ..entry.clone() };
        store.put("site-v1", &replaced).await.unwrap();
        let found = store.match_entry("site-v1", &entry.cache_key).await.unwrap();
        assert_eq!(found.map(|e| e.body), Some(b"<html>v2".to_vec()));
        assert!(store.delete("site-v1").await.unwrap());
    }
}
