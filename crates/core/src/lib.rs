//! Core types and shared functionality for sparkcache.
//!
//! This crate provides:
//! - Generation-scoped response cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{ActiveVersion, CacheDb, CacheStore, CachedResponse, Generation, GenerationInfo, GenerationKind};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
