//! Network side of the proxy.
//!
//! ### Fetcher contract
//! - Network-level failures (DNS, refused connection, timeout) are errors.
//! - HTTP-level failures (4xx/5xx) are ordinary responses; the caller decides
//!   what a status means.
//!
//! ### URL Canonicalization
//! - Trim whitespace, resolve relative references against the site origin
//! - Lowercase host, remove fragments
//! - Preserve query string

pub mod request;
pub mod url;

use bytes::Bytes;
use reqwest::Url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use request::{Request, RequestMode};
pub use url::{UrlError, canonicalize, same_origin};

use sparkcache_core::{AppConfig, CachedResponse, Error};

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "sparkcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 5s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "sparkcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(5000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::default()
        }
    }
}

/// Response from the network or replayed from the cache.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Response headers
    pub headers: HeaderMap,
    /// Time taken to fetch in milliseconds (0 when replayed)
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// The synthesized reply for a navigation with no network and no fallback.
    pub fn offline(url: Url) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        Self {
            final_url: url.clone(),
            url,
            status: StatusCode::SERVICE_UNAVAILABLE,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            bytes: Bytes::from_static(b"Offline"),
            headers,
            fetch_ms: 0,
        }
    }

    /// Only exact 200 responses are written back.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK
    }

    /// Snapshot this response for storage under `request`'s identity.
    pub fn to_cached(&self, request: &Request) -> CachedResponse {
        let pairs: Vec<(String, String)> = self
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        CachedResponse {
            cache_key: request.cache_key(),
            method: request.method.as_str().to_string(),
            url: request.url.to_string(),
            status_code: self.status.as_u16(),
            content_type: self.content_type.clone(),
            headers_json: serde_json::to_string(&pairs).ok(),
            body: self.bytes.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a response from a stored entry.
    ///
    /// Headers that no longer parse are dropped rather than failing the replay.
    pub fn from_cached(entry: CachedResponse) -> Result<Self, Error> {
        let url = Url::parse(&entry.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", entry.url)))?;
        let status = StatusCode::from_u16(entry.status_code)
            .map_err(|_| Error::InvalidInput(format!("stored status {} is not valid", entry.status_code)))?;

        let pairs: Vec<(String, String)> = entry
            .headers_json
            .as_deref()
            .and_then(|j| serde_json::from_str(j).ok())
            .unwrap_or_default();
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
                headers.append(name, value);
            }
        }

        Ok(Self {
            final_url: url.clone(),
            url,
            status,
            content_type: entry.content_type,
            bytes: Bytes::from(entry.body),
            headers,
            fetch_ms: 0,
        })
    }
}

/// Issues requests to the network.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. Only network-level failures are errors.
    async fn fetch(&self, request: &Request) -> Result<FetchResponse, Error>;
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn classify_reqwest_error(url: &Url, err: &reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::FetchTimeout(format!("{url}: {err}"))
    } else {
        Error::Network(format!("{url}: {err}"))
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&request.url, &e))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(&request.url, &e))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            fetch_ms,
            bytes = bytes.len(),
            "network fetch complete"
        );

        Ok(FetchResponse { url: request.url.clone(), final_url, status, content_type, bytes, headers, fetch_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response(status: StatusCode) -> FetchResponse {
        let url = Url::parse("https://example.com/styles.css").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/css"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=60"));
        FetchResponse {
            final_url: url.clone(),
            url,
            status,
            content_type: Some("text/css".to_string()),
            bytes: Bytes::from_static(b"body { color: red }"),
            headers,
            fetch_ms: 12,
        }
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "sparkcache/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(5000));
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "site-sw/2".into(), timeout_ms: 750, ..Default::default() };
        let config = FetchConfig::from_app_config(&app);
        assert_eq!(config.user_agent, "site-sw/2");
        assert_eq!(config.timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_only_exact_200_is_cacheable() {
        assert!(sample_response(StatusCode::OK).is_cacheable());
        assert!(!sample_response(StatusCode::NO_CONTENT).is_cacheable());
        assert!(!sample_response(StatusCode::MOVED_PERMANENTLY).is_cacheable());
        assert!(!sample_response(StatusCode::NOT_FOUND).is_cacheable());
    }

    #[test]
    fn test_cached_replay_preserves_response() {
        let request = Request::get("https://example.com/styles.css", None).unwrap();
        let original = sample_response(StatusCode::OK);

        let entry = original.to_cached(&request);
        assert_eq!(entry.cache_key, request.cache_key());
        assert_eq!(entry.status_code, 200);

        let replayed = FetchResponse::from_cached(entry).unwrap();
        assert_eq!(replayed.status, StatusCode::OK);
        assert_eq!(replayed.bytes, original.bytes);
        assert_eq!(replayed.content_type.as_deref(), Some("text/css"));
        assert_eq!(replayed.headers.get(header::CACHE_CONTROL).unwrap(), "max-age=60");
        assert_eq!(replayed.fetch_ms, 0);
    }

    #[test]
    fn test_from_cached_tolerates_bad_headers_json() {
        let request = Request::get("https://example.com/styles.css", None).unwrap();
        let mut entry = sample_response(StatusCode::OK).to_cached(&request);
        entry.headers_json = Some("not json".into());

        let replayed = FetchResponse::from_cached(entry).unwrap();
        assert!(replayed.headers.is_empty());
    }

    #[test]
    fn test_offline_response() {
        let response = FetchResponse::offline(Url::parse("https://example.com/about").unwrap());
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.bytes.as_ref(), b"Offline");
        assert!(!response.is_cacheable());
    }

    #[tokio::test]
    async fn test_http_fetcher_new() {
        assert!(HttpFetcher::new(FetchConfig::default()).is_ok());
    }
}
