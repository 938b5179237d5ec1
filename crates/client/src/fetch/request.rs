//! Intercepted request model.

use reqwest::Method;
use reqwest::header::HeaderMap;
use sparkcache_core::cache::hash::compute_cache_key;
use url::Url;

use super::url::{UrlError, canonicalize};

/// How the caller intends to use the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    /// Subresource restricted to the caller's origin.
    SameOrigin,
    /// Opaque cross-origin subresource.
    NoCors,
    /// Cross-origin subresource with CORS.
    #[default]
    Cors,
}

/// A request delivered to the proxy.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: HeaderMap,
}

impl Request {
    /// Build a request with a canonicalized URL.
    pub fn new(method: Method, url: &str, base: Option<&Url>) -> Result<Self, UrlError> {
        Ok(Self { method, url: canonicalize(url, base)?, mode: RequestMode::default(), headers: HeaderMap::new() })
    }

    /// A subresource `GET`.
    pub fn get(url: &str, base: Option<&Url>) -> Result<Self, UrlError> {
        Self::new(Method::GET, url, base)
    }

    /// A top-level document load.
    pub fn navigate(url: &str, base: Option<&Url>) -> Result<Self, UrlError> {
        Ok(Self::get(url, base)?.with_mode(RequestMode::Navigate))
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Only idempotent `GET`s ever touch the cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }

    /// Request identity used as the store key.
    pub fn cache_key(&self) -> String {
        compute_cache_key(self.method.as_str(), self.url.as_str())
    }
}
