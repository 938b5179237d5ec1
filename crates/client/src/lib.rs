//! Client code for sparkcache.
//!
//! This crate provides the HTTP fetch pipeline and the offline-first caching
//! proxy that sits in front of it, shared by the server and tests.

pub mod fetch;
pub mod proxy;

pub use reqwest::Method;

pub use fetch::{FetchConfig, FetchResponse, Fetcher, HttpFetcher, Request, RequestMode};
pub use proxy::{
    ActivationReport, BackgroundTasks, CachingProxy, Command, InstallReport, ProxyConfig, ProxyResponse,
    ResponseSource, RoutingClass, WorkerState,
};
