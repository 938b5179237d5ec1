//! Activation: delete every generation the current version does not own.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sparkcache_core::Error;
use tokio::task::JoinSet;

use super::{CachingProxy, WorkerState};

/// Outcome of an activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    /// Generations deleted as superseded.
    pub deleted: Vec<String>,
    /// Generations whose deletion failed. They are retried on the next activation.
    pub failed: Vec<String>,
}

impl CachingProxy {
    /// Reap superseded generations and start controlling clients.
    ///
    /// The store records this version as active before anything is deleted,
    /// which fences out write-backs from the version being replaced.
    /// Deletion is best effort: failures are logged and reported, and never
    /// prevent activation.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the proxy is installed or already active; the
    /// store's error if the active version cannot be recorded, in which case
    /// the proxy returns to its previous state. Dropping the future also
    /// restores the previous state.
    pub async fn on_activate(&self) -> Result<ActivationReport, Error> {
        let step = self.transition(
            "activate",
            |state| matches!(state, WorkerState::Installed | WorkerState::Activated),
            WorkerState::Activating,
            |previous| previous,
        )?;

        if let Err(e) = self
            .store
            .set_active(&self.config.static_cache, &self.config.runtime_cache)
            .await
        {
            step.fail();
            tracing::error!(generation = %self.config.static_cache, error = %e, "could not record active version");
            return Err(e);
        }

        let report = self.reap().await;
        step.complete(WorkerState::Activated);
        tracing::info!(
            generation = %self.config.static_cache,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "activated, controlling clients"
        );
        Ok(report)
    }

    async fn reap(&self) -> ActivationReport {
        let mut report = ActivationReport::default();
        let current = self.config.current_generations();

        let names = match self.store.list_names().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "could not list generations, skipping cleanup");
                return report;
            }
        };

        let mut join_set = JoinSet::new();
        for name in names.into_iter().filter(|name| !current.contains(&name.as_str())) {
            let store = Arc::clone(&self.store);
            join_set.spawn(async move {
                let result = store.delete(&name).await;
                (name, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(true))) => {
                    tracing::info!(generation = %name, "deleted old cache");
                    report.deleted.push(name);
                }
                Ok((name, Ok(false))) => tracing::debug!(generation = %name, "old cache already gone"),
                Ok((name, Err(e))) => {
                    tracing::warn!(generation = %name, error = %e, "failed to delete old cache");
                    report.failed.push(name);
                }
                Err(e) => tracing::warn!(error = %e, "cache cleanup task failed"),
            }
        }

        report.deleted.sort();
        report.failed.sort();
        report
    }
}
