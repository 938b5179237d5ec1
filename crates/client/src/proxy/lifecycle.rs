//! Worker lifecycle states and host messages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sparkcache_core::Error;

/// Where a proxy version is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Constructed, nothing preloaded yet.
    Parsed,
    /// Manifest preload in progress.
    Installing,
    /// Preload complete, waiting to activate.
    Installed,
    /// Reaping superseded generations.
    Activating,
    /// Controlling clients.
    Activated,
    /// Install failed or a newer version took over.
    Redundant,
}

impl WorkerState {
    /// Only an activated proxy intercepts requests.
    pub fn controls_clients(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message posted to the proxy by its host.
///
/// Deserializes from `{"type": "SKIP_WAITING"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Activate a waiting version without waiting for old clients to close.
    SkipWaiting,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SKIP_WAITING" => Ok(Command::SkipWaiting),
            other => Err(Error::InvalidInput(format!("unknown command: {other}"))),
        }
    }
}
