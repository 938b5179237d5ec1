//! SQLite-backed store for cache generations and their response entries.
//!
//! This module provides a persistent, generation-scoped response cache using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named, versioned generations (static and runtime)
//! - Request-identity keys hashed with SHA-256
//! - Atomic batch writes for install-time preloading
//! - An active-version record that fences out superseded writers
//! - Automatic schema migrations and WAL mode

pub mod active;
pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use active::ActiveVersion;
pub use connection::CacheDb;
pub use entries::CachedResponse;
pub use generations::{Generation, GenerationInfo, GenerationKind};
pub use store::CacheStore;
