//! Offline-first caching proxy.
//!
//! One [`CachingProxy`] is one deployed version of the cache policy. The host
//! drives it through four signals:
//!
//! - [`CachingProxy::on_install`] preloads the manifest into the static generation
//! - [`CachingProxy::on_activate`] reaps superseded generations and claims clients
//! - [`CachingProxy::on_fetch`] routes a request to a strategy
//! - [`CachingProxy::on_message`] handles `SKIP_WAITING`
//!
//! Storage and network are injected, so the proxy holds no global state.

mod install;
mod lifecycle;
mod reaper;
mod router;
mod strategy;
mod tasks;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sparkcache_core::{AppConfig, CacheStore, Error};
use tokio::sync::watch;
use url::Url;

use crate::fetch::{FetchResponse, Fetcher, Request, canonicalize};

pub use install::InstallReport;
pub use lifecycle::{Command, WorkerState};
pub use reaper::ActivationReport;
pub use router::{Router, RoutingClass};
pub use strategy::NetworkPolicy;
pub use tasks::BackgroundTasks;

/// Version-specific settings of a proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub origin: Url,
    pub static_cache: String,
    pub runtime_cache: String,
    pub manifest: Vec<String>,
    pub runtime_patterns: Vec<String>,
    pub offline_fallback: Option<String>,
    pub fetch_timeout: Duration,
    pub slow_request: Duration,
    pub skip_waiting: bool,
}

impl ProxyConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin, None)?;
        Ok(Self {
            origin,
            static_cache: config.static_cache.clone(),
            runtime_cache: config.runtime_cache.clone(),
            manifest: config.manifest.clone(),
            runtime_patterns: config.runtime_patterns.clone(),
            offline_fallback: config.offline_fallback.clone(),
            fetch_timeout: config.timeout(),
            slow_request: config.slow_request(),
            skip_waiting: config.skip_waiting,
        })
    }

    /// Generation names that survive activation.
    pub fn current_generations(&self) -> [&str; 2] {
        [&self.static_cache, &self.runtime_cache]
    }
}

/// Where a response handed to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
    Synthetic,
}

/// Response plus how it was produced.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub response: FetchResponse,
    pub source: ResponseSource,
    pub class: RoutingClass,
}

impl ProxyResponse {
    fn new(response: FetchResponse, source: ResponseSource, class: RoutingClass) -> Self {
        Self { response, source, class }
    }
}

/// A deployed version of the offline-first cache policy.
pub struct CachingProxy {
    config: ProxyConfig,
    router: Router,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    tasks: BackgroundTasks,
    state: Arc<watch::Sender<WorkerState>>,
    skip_waiting: AtomicBool,
    offline_key: Option<String>,
}

impl CachingProxy {
    /// Build a proxy in the `Parsed` state.
    ///
    /// Fails if an allow-list pattern does not compile or the offline
    /// fallback path cannot be resolved against the origin.
    pub fn new(config: ProxyConfig, store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let router = Router::new(config.origin.clone(), &config.runtime_patterns)?;
        let offline_key = config
            .offline_fallback
            .as_deref()
            .map(|path| Request::get(path, Some(&config.origin)).map(|r| r.cache_key()))
            .transpose()?;
        let (state, _) = watch::channel(WorkerState::Parsed);

        Ok(Self {
            config,
            router,
            store,
            fetcher,
            tasks: BackgroundTasks::new(),
            state: Arc::new(state),
            skip_waiting: AtomicBool::new(false),
            offline_key,
        })
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Tracker of detached write-backs and revalidations.
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Observe lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// True when an installed version has been told to skip waiting.
    pub fn should_activate(&self) -> bool {
        self.state() == WorkerState::Installed && self.skip_waiting.load(Ordering::Acquire)
    }

    /// Handle a host message. Returns whether the proxy is now ready to activate.
    pub fn on_message(&self, command: Command) -> bool {
        match command {
            Command::SkipWaiting => {
                tracing::info!(state = %self.state(), "skip waiting requested");
                self.skip_waiting.store(true, Ordering::Release);
            }
        }
        self.should_activate()
    }

    /// Mark this version as superseded; it stops intercepting and writing.
    ///
    /// A proxy also retires itself when the store refuses one of its
    /// write-backs because a newer version has activated.
    pub fn retire(&self) {
        self.state.send_replace(WorkerState::Redundant);
        tracing::info!(generation = %self.config.static_cache, "proxy retired");
    }

    /// Route an intercepted request.
    ///
    /// Dropping the returned future cancels the network fetch it is waiting
    /// on, but never a write-back it already scheduled.
    pub async fn on_fetch(&self, request: Request) -> Result<ProxyResponse, Error> {
        if !self.state().controls_clients() {
            tracing::debug!(url = %request.url, state = %self.state(), "not controlling clients, passing through");
            return self.passthrough(&request, RoutingClass::Passthrough).await;
        }

        let class = self.router.classify(&request);
        tracing::debug!(method = %request.method, url = %request.url, ?class, "routing request");

        match class {
            RoutingClass::Navigation | RoutingClass::SameOriginStatic => self.cache_first(&request, class).await,
            RoutingClass::AllowedExternal => self.stale_while_revalidate(&request).await,
            RoutingClass::Passthrough => self.passthrough(&request, class).await,
        }
    }

    fn network_policy(&self) -> NetworkPolicy {
        NetworkPolicy { timeout: self.config.fetch_timeout, slow_request: self.config.slow_request }
    }

    /// Atomically start a lifecycle step.
    ///
    /// The returned guard must be settled with [`Transition::complete`] or
    /// [`Transition::fail`]. If it is dropped first, because the caller gave
    /// up on the future, the state moves to `rollback(previous)`.
    fn transition(
        &self, signal: &'static str, allowed: fn(WorkerState) -> bool, during: WorkerState,
        rollback: fn(WorkerState) -> WorkerState,
    ) -> Result<Transition<'_>, Error> {
        let mut previous = Err(WorkerState::Parsed);
        self.state.send_if_modified(|state| {
            if allowed(*state) {
                previous = Ok(*state);
                *state = during;
                true
            } else {
                previous = Err(*state);
                false
            }
        });

        match previous {
            Ok(previous) => Ok(Transition {
                state: &self.state,
                signal,
                during,
                rollback: rollback(previous),
                settled: false,
            }),
            Err(current) => Err(Error::InvalidState(format!("cannot {signal} while {current}"))),
        }
    }
}

/// An in-progress lifecycle step.
///
/// Settling only applies while the state is still the step's own; a proxy
/// retired mid-step stays retired.
struct Transition<'a> {
    state: &'a watch::Sender<WorkerState>,
    signal: &'static str,
    during: WorkerState,
    rollback: WorkerState,
    settled: bool,
}

impl Transition<'_> {
    fn complete(mut self, next: WorkerState) {
        self.settle(next);
    }

    fn fail(mut self) {
        let rollback = self.rollback;
        self.settle(rollback);
    }

    fn settle(&mut self, next: WorkerState) {
        self.settled = true;
        let during = self.during;
        self.state.send_if_modified(|state| {
            if *state == during {
                *state = next;
                true
            } else {
                false
            }
        });
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(signal = self.signal, state = %self.rollback, "lifecycle step abandoned, rolling back");
            let rollback = self.rollback;
            self.settle(rollback);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing;
