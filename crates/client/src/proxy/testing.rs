//! Test support: a scripted network and proxy builders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use sparkcache_core::{CacheDb, Error};
use url::Url;

use super::{CachingProxy, ProxyConfig};
use crate::fetch::{FetchResponse, Fetcher, Request};

pub(crate) const ORIGIN: &str = "https://harnessthespark.com";

#[derive(Debug, Clone)]
enum Reply {
    Respond { status: u16, body: Bytes, delay: Duration },
    Fail,
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, Reply>,
    calls: HashMap<String, usize>,
}

/// Fake network answering from a per-URL script and counting calls.
#[derive(Debug, Default)]
pub(crate) struct ScriptedFetcher {
    script: Mutex<Script>,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn set(&self, url: &str, reply: Reply) {
        self.script.lock().unwrap().replies.insert(url.to_string(), reply);
    }

    pub(crate) fn respond(&self, url: &str, status: u16, body: &str) {
        self.respond_after(url, Duration::ZERO, status, body);
    }

    pub(crate) fn respond_after(&self, url: &str, delay: Duration, status: u16, body: &str) {
        self.set(url, Reply::Respond { status, body: Bytes::copy_from_slice(body.as_bytes()), delay });
    }

    pub(crate) fn fail(&self, url: &str) {
        self.set(url, Reply::Fail);
    }

    /// Script every manifest entry of `proxy`, body = its path.
    pub(crate) fn respond_manifest(&self, proxy: &CachingProxy, status: u16) {
        for path in &proxy.config().manifest {
            let url = Request::get(path, Some(&proxy.config().origin)).unwrap().url;
            self.respond(url.as_str(), status, path);
        }
    }

    pub(crate) fn calls(&self, url: &str) -> usize {
        self.script.lock().unwrap().calls.get(url).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<FetchResponse, Error> {
        let key = request.url.to_string();
        let reply = {
            let mut script = self.script.lock().unwrap();
            *script.calls.entry(key.clone()).or_default() += 1;
            script.replies.get(&key).cloned()
        };

        match reply {
            Some(Reply::Respond { status, body, delay }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(FetchResponse {
                    url: request.url.clone(),
                    final_url: request.url.clone(),
                    status: StatusCode::from_u16(status).unwrap(),
                    content_type: Some("text/plain".into()),
                    bytes: body,
                    headers: HeaderMap::new(),
                    fetch_ms: delay.as_millis() as u64,
                })
            }
            Some(Reply::Fail) => Err(Error::Network(format!("{key}: connection refused"))),
            None => Err(Error::Network(format!("{key}: unscripted"))),
        }
    }
}

pub(crate) fn test_config() -> ProxyConfig {
    ProxyConfig {
        origin: Url::parse(ORIGIN).unwrap(),
        static_cache: "spark-v2".into(),
        runtime_cache: "spark-runtime-v2".into(),
        manifest: vec!["/".into(), "/index.html".into(), "/styles.css".into()],
        runtime_patterns: sparkcache_core::AppConfig::default().runtime_patterns,
        offline_fallback: Some("/offline.html".into()),
        fetch_timeout: Duration::from_secs(1),
        slow_request: Duration::from_millis(500),
        skip_waiting: true,
    }
}

pub(crate) fn site_get(path: &str) -> Request {
    Request::get(path, Some(&Url::parse(ORIGIN).unwrap())).unwrap()
}

pub(crate) fn site_navigate(path: &str) -> Request {
    Request::navigate(path, Some(&Url::parse(ORIGIN).unwrap())).unwrap()
}

pub(crate) async fn proxy_with_config(
    config: ProxyConfig, fetcher: ScriptedFetcher,
) -> (CachingProxy, Arc<ScriptedFetcher>, CacheDb) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let fetcher = Arc::new(fetcher);
    let proxy = CachingProxy::new(config, Arc::new(db.clone()), fetcher.clone()).unwrap();
    (proxy, fetcher, db)
}

pub(crate) async fn proxy_with(fetcher: ScriptedFetcher) -> (CachingProxy, Arc<ScriptedFetcher>, CacheDb) {
    proxy_with_config(test_config(), fetcher).await
}

/// Installed and activated proxy over a fresh store.
pub(crate) async fn active_proxy() -> (CachingProxy, Arc<ScriptedFetcher>, CacheDb) {
    let (proxy, fetcher, db) = proxy_with(ScriptedFetcher::new()).await;
    fetcher.respond_manifest(&proxy, 200);
    proxy.on_install().await.unwrap();
    proxy.on_activate().await.unwrap();
    (proxy, fetcher, db)
}
