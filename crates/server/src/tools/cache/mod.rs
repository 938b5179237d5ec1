//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and pruning cache generations.

pub mod delete;
pub mod list;

pub use delete::{CacheDeleteParams, delete_impl};
pub use list::list_impl;
