//! Integration tests for HttpFetcher.
//!
//! Uses wiremock for HTTP mocking. Covers success, HTTP errors surfaced as
//! responses, refused connections, timeouts, and the body size cap.

use std::time::Duration;

use reqwest::StatusCode;
use sparkcache_client::{FetchConfig, Fetcher, HttpFetcher, Request};
use sparkcache_core::Error;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(config: FetchConfig) -> HttpFetcher {
    HttpFetcher::new(config).expect("failed to create fetcher")
}

fn get(server: &MockServer, route: &str) -> Request {
    Request::get(&format!("{}{route}", server.uri()), None).expect("valid url")
}

#[tokio::test]
async fn test_fetch_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/styles.css"))
        .and(header("user-agent", "sparkcache/0.1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("body { margin: 0 }")
                .insert_header("content-type", "text/css"),
        )
        .mount(&server)
        .await;

    let response = fetcher(FetchConfig::default())
        .fetch(&get(&server, "/styles.css"))
        .await
        .expect("fetch failed");

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.bytes.as_ref(), b"body { margin: 0 }");
    assert_eq!(response.content_type.as_deref(), Some("text/css"));
    assert!(response.is_cacheable());
}

#[tokio::test]
async fn test_http_error_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let response = fetcher(FetchConfig::default())
        .fetch(&get(&server, "/gone"))
        .await
        .expect("404 should not be an error");

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert!(!response.is_cacheable());
}

#[tokio::test]
async fn test_non_get_method_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/contact"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::new(reqwest::Method::POST, &format!("{}/contact", server.uri()), None).unwrap();
    let response = fetcher(FetchConfig::default()).fetch(&request).await.unwrap();

    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let request = Request::get(&format!("http://{addr}/"), None).unwrap();
    let result = fetcher(FetchConfig::default()).fetch(&request).await;

    assert!(matches!(result, Err(Error::Network(_))), "got {result:?}");
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let config = FetchConfig { timeout: Duration::from_millis(100), ..FetchConfig::default() };
    let result = fetcher(config).fetch(&get(&server, "/slow")).await;

    assert!(matches!(result, Err(Error::FetchTimeout(_))), "got {result:?}");
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;

    let config = FetchConfig { max_bytes: 1024, ..FetchConfig::default() };
    let result = fetcher(config).fetch(&get(&server, "/big.js")).await;

    assert!(matches!(result, Err(Error::FetchTooLarge(_))), "got {result:?}");
}
