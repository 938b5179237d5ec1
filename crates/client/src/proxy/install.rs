//! Install-time manifest preload.
//!
//! All manifest assets are fetched in parallel and written in one
//! transaction. Any failure aborts the whole batch and marks the version
//! redundant, leaving whatever was serving before untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sparkcache_core::{CachedResponse, Error, GenerationKind};
use tokio::task::JoinSet;

use super::strategy::timed_fetch;
use super::{CachingProxy, WorkerState};
use crate::fetch::Request;

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// Static generation the manifest was stored in.
    pub generation: String,
    /// Number of manifest assets stored.
    pub assets: usize,
    /// Whether the proxy may activate right away.
    pub ready: bool,
}

fn install_failed(err: Error) -> Error {
    match err {
        Error::InstallFailed(_) => err,
        other => Error::InstallFailed(other.to_string()),
    }
}

impl CachingProxy {
    /// Preload the manifest into the static generation.
    ///
    /// # Errors
    ///
    /// `InvalidState` while another install or an activation is running or
    /// once the proxy is active; `InstallFailed` if any asset could not be
    /// fetched with a success status or the batch could not be stored.
    ///
    /// Dropping the future mid-install leaves the proxy `Redundant`, so the
    /// install can be retried.
    pub async fn on_install(&self) -> Result<InstallReport, Error> {
        let step = self.transition(
            "install",
            |state| matches!(state, WorkerState::Parsed | WorkerState::Installed | WorkerState::Redundant),
            WorkerState::Installing,
            |_| WorkerState::Redundant,
        )?;

        let generation = self.config.static_cache.clone();
        tracing::info!(generation, assets = self.config.manifest.len(), "installing");

        match self.preload(&generation).await {
            Ok(assets) => {
                if self.config.skip_waiting {
                    self.skip_waiting.store(true, std::sync::atomic::Ordering::Release);
                }
                step.complete(WorkerState::Installed);
                let ready = self.should_activate();
                tracing::info!(generation, assets, ready, "static assets cached");
                Ok(InstallReport { generation, assets, ready })
            }
            Err(e) => {
                step.fail();
                tracing::error!(generation, error = %e, "install failed, previous version keeps serving");
                Err(e)
            }
        }
    }

    async fn preload(&self, generation: &str) -> Result<usize, Error> {
        let requests = self
            .config
            .manifest
            .iter()
            .map(|path| {
                Request::get(path, Some(&self.config.origin))
                    .map_err(|e| Error::InstallFailed(format!("manifest entry {path}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let existed = self
            .store
            .list_names()
            .await
            .map_err(install_failed)?
            .contains(generation);
        self.store
            .open(generation, GenerationKind::Static)
            .await
            .map_err(install_failed)?;

        let stored = match self.fetch_manifest(requests).await {
            Ok(entries) => self
                .store
                .put_all(generation, &entries)
                .await
                .map(|()| entries.len()),
            Err(e) => Err(e),
        };

        if stored.is_err() && !existed {
            match self.store.delete(generation).await {
                Ok(_) => tracing::debug!(generation, "removed partially installed generation"),
                Err(e) => tracing::warn!(generation, error = %e, "could not remove partially installed generation"),
            }
        }

        stored.map_err(install_failed)
    }

    /// Fetch every manifest request in parallel, failing on the first error.
    ///
    /// Entries come back in manifest order.
    async fn fetch_manifest(&self, requests: Vec<Request>) -> Result<Vec<CachedResponse>, Error> {
        let mut entries: Vec<Option<CachedResponse>> = vec![None; requests.len()];
        let mut join_set = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let policy = self.network_policy();
            join_set.spawn(async move {
                let result = timed_fetch(fetcher.as_ref(), &request, policy).await;
                (index, request, result)
            });
        }

        // Returning early drops the set, which aborts the remaining fetches.
        while let Some(joined) = join_set.join_next().await {
            let (index, request, result) =
                joined.map_err(|e| Error::InstallFailed(format!("preload task failed: {e}")))?;
            let response = result.map_err(|e| Error::InstallFailed(format!("{}: {e}", request.url)))?;

            if !response.status.is_success() {
                return Err(Error::InstallFailed(format!("{}: status {}", request.url, response.status.as_u16())));
            }

            entries[index] = Some(response.to_cached(&request));
        }

        Ok(entries.into_iter().flatten().collect())
    }
}
