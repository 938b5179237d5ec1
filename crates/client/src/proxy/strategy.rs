//! Fetch strategies: cache-first, stale-while-revalidate, passthrough.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sparkcache_core::{CacheStore, CachedResponse, Error, GenerationKind};

use tokio::sync::watch;

use super::{CachingProxy, ProxyResponse, ResponseSource, RoutingClass, WorkerState};
use crate::fetch::{FetchResponse, Fetcher, Request};

/// Bounds applied to every network fetch the proxy makes.
#[derive(Debug, Clone, Copy)]
pub struct NetworkPolicy {
    pub timeout: Duration,
    /// Fetches slower than this are logged.
    pub slow_request: Duration,
}

/// Fetch with a hard timeout, logging slow requests.
pub(crate) async fn timed_fetch(
    fetcher: &dyn Fetcher, request: &Request, policy: NetworkPolicy,
) -> Result<FetchResponse, Error> {
    let start = Instant::now();
    let result = tokio::time::timeout(policy.timeout, fetcher.fetch(request))
        .await
        .map_err(|_| Error::FetchTimeout(format!("{} after {}ms", request.url, policy.timeout.as_millis())))?;

    let elapsed = start.elapsed();
    if elapsed > policy.slow_request {
        tracing::warn!(url = %request.url, elapsed_ms = elapsed.as_millis() as u64, "slow request detected");
    }

    result
}

/// What a detached write-back needs, independent of the proxy's lifetime.
struct Writer {
    store: Arc<dyn CacheStore>,
    state: Arc<watch::Sender<WorkerState>>,
    static_cache: String,
    runtime_cache: String,
}

impl Writer {
    /// Write one entry, logging instead of failing.
    ///
    /// Static generations are never created here: a write into a reaped static
    /// generation fails on the store instead of resurrecting it. A write the
    /// store refuses because another version is active retires the proxy.
    async fn store(&self, kind: GenerationKind, entry: &CachedResponse) {
        let generation = match kind {
            GenerationKind::Static => self.static_cache.as_str(),
            GenerationKind::Runtime => self.runtime_cache.as_str(),
        };

        match self
            .store
            .put_if_active(&self.static_cache, &self.runtime_cache, kind, entry)
            .await
        {
            Ok(true) => tracing::debug!(generation, url = %entry.url, "cache write-back stored"),
            Ok(false) => {
                self.state.send_replace(WorkerState::Redundant);
                tracing::info!(generation, url = %entry.url, "newer version active, write-back dropped and proxy retired");
            }
            Err(e) => tracing::warn!(generation, url = %entry.url, error = %e, "cache write-back failed"),
        }
    }
}

impl CachingProxy {
    /// Lookup that degrades storage errors and unreadable entries to a miss.
    async fn lookup(&self, generation: &str, request: &Request) -> Option<FetchResponse> {
        let entry = match self.store.match_entry(generation, &request.cache_key()).await {
            Ok(entry) => entry?,
            Err(e) => {
                tracing::warn!(generation, url = %request.url, error = %e, "cache lookup failed, treating as miss");
                return None;
            }
        };

        match FetchResponse::from_cached(entry) {
            Ok(response) => Some(response),
            Err(e) => {
                tracing::warn!(generation, url = %request.url, error = %e, "unreadable cache entry, treating as miss");
                None
            }
        }
    }

    async fn fetch_network(&self, request: &Request) -> Result<FetchResponse, Error> {
        timed_fetch(self.fetcher.as_ref(), request, self.network_policy()).await
    }

    fn writer(&self) -> Writer {
        Writer {
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
            static_cache: self.config.static_cache.clone(),
            runtime_cache: self.config.runtime_cache.clone(),
        }
    }

    /// Schedule a detached write of `response` under `request`'s key.
    fn write_back(&self, kind: GenerationKind, request: &Request, response: &FetchResponse) {
        if !self.state().controls_clients() {
            tracing::debug!(%kind, url = %request.url, "skipping write-back from inactive proxy");
            return;
        }

        let entry = response.to_cached(request);
        let writer = self.writer();
        self.tasks.spawn(async move { writer.store(kind, &entry).await });
    }

    /// Schedule a detached refresh of an allow-listed entry.
    fn revalidate(&self, request: &Request) {
        let request = request.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let policy = self.network_policy();
        let writer = self.writer();

        self.tasks.spawn(async move {
            match timed_fetch(fetcher.as_ref(), &request, policy).await {
                Ok(response) if response.is_cacheable() => {
                    let entry = response.to_cached(&request);
                    writer.store(GenerationKind::Runtime, &entry).await;
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status.as_u16(), "revalidation not cached");
                }
                Err(e) => tracing::debug!(url = %request.url, error = %e, "background revalidation failed"),
            }
        });
    }

    /// Navigation and same-origin assets.
    pub(crate) async fn cache_first(&self, request: &Request, class: RoutingClass) -> Result<ProxyResponse, Error> {
        let generation = self.config.static_cache.as_str();

        if let Some(cached) = self.lookup(generation, request).await {
            tracing::debug!(url = %request.url, ?class, "serving from cache");
            return Ok(ProxyResponse::new(cached, ResponseSource::Cache, class));
        }

        match self.fetch_network(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.write_back(GenerationKind::Static, request, &response);
                }
                Ok(ProxyResponse::new(response, ResponseSource::Network, class))
            }
            Err(e) if class == RoutingClass::Navigation && e.is_network() => {
                Ok(self.offline_response(request, &e).await)
            }
            Err(e) => Err(e),
        }
    }

    /// Offline document if stored, otherwise a synthesized 503.
    async fn offline_response(&self, request: &Request, cause: &Error) -> ProxyResponse {
        tracing::warn!(url = %request.url, error = %cause, "navigation failed, serving offline response");

        if let Some(key) = &self.offline_key {
            match self.store.match_entry(&self.config.static_cache, key).await {
                Ok(Some(entry)) => match FetchResponse::from_cached(entry) {
                    Ok(response) => {
                        return ProxyResponse::new(response, ResponseSource::OfflineFallback, RoutingClass::Navigation);
                    }
                    Err(e) => tracing::warn!(error = %e, "unreadable offline document"),
                },
                Ok(None) => tracing::debug!("no offline document cached"),
                Err(e) => tracing::warn!(error = %e, "offline document lookup failed"),
            }
        }

        let offline = FetchResponse::offline(request.url.clone());
        ProxyResponse::new(offline, ResponseSource::Synthetic, RoutingClass::Navigation)
    }

    /// Allow-listed external resources.
    ///
    /// The stale response is fully materialized before the revalidation task
    /// is spawned, so the caller always sees the previously stored bytes.
    pub(crate) async fn stale_while_revalidate(&self, request: &Request) -> Result<ProxyResponse, Error> {
        let generation = self.config.runtime_cache.as_str();

        if let Some(cached) = self.lookup(generation, request).await {
            tracing::debug!(url = %request.url, "serving external asset from cache");
            self.revalidate(request);
            return Ok(ProxyResponse::new(cached, ResponseSource::Cache, RoutingClass::AllowedExternal));
        }

        let response = self.fetch_network(request).await?;
        if response.is_cacheable() {
            self.write_back(GenerationKind::Runtime, request, &response);
        }
        Ok(ProxyResponse::new(response, ResponseSource::Network, RoutingClass::AllowedExternal))
    }

    /// Network only; no cache interaction.
    pub(crate) async fn passthrough(&self, request: &Request, class: RoutingClass) -> Result<ProxyResponse, Error> {
        let response = self.fetch_network(request).await?;
        Ok(ProxyResponse::new(response, ResponseSource::Network, class))
    }
}
