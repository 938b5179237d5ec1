//! sw_install, sw_activate and sw_message tool implementations.
//!
//! Each tool delivers one lifecycle signal to the proxy and reports the
//! resulting state.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sparkcache_client::{ActivationReport, CachingProxy, Command, InstallReport, WorkerState};
use sparkcache_core::Error;

use super::json_result;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message type. Only "SKIP_WAITING" is understood.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Output from the sw_install tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwInstallOutput {
    pub state: WorkerState,
    #[serde(flatten)]
    pub report: InstallReport,
}

/// Output from the sw_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwActivateOutput {
    pub state: WorkerState,
    #[serde(flatten)]
    pub report: ActivationReport,
}

/// Output from the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwMessageOutput {
    pub state: WorkerState,
    /// Whether the message left the proxy ready to activate.
    pub ready: bool,
    /// Present when the message triggered an activation.
    pub activation: Option<ActivationReport>,
}

/// Implementation of the sw_install tool.
pub async fn install_impl(proxy: &CachingProxy) -> Result<CallToolResult, McpError> {
    let report = proxy.on_install().await?;
    json_result(&SwInstallOutput { state: proxy.state(), report })
}

/// Implementation of the sw_activate tool.
pub async fn activate_impl(proxy: &CachingProxy) -> Result<CallToolResult, McpError> {
    let report = proxy.on_activate().await?;
    json_result(&SwActivateOutput { state: proxy.state(), report })
}

/// Implementation of the sw_message tool.
///
/// A message that makes an installed proxy ready activates it immediately.
pub async fn message_impl(proxy: &CachingProxy, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let command: Command = params.kind.parse()?;
    let ready = proxy.on_message(command);

    let activation = if ready { activate_after_message(proxy).await? } else { None };

    json_result(&SwMessageOutput { state: proxy.state(), ready, activation })
}

/// Activate a proxy a message made ready.
///
/// Concurrent messages can all see the proxy ready; only one of them
/// activates it and the rest report no activation instead of failing.
async fn activate_after_message(proxy: &CachingProxy) -> Result<Option<ActivationReport>, Error> {
    match proxy.on_activate().await {
        Ok(report) => Ok(Some(report)),
        Err(Error::InvalidState(_)) if matches!(proxy.state(), WorkerState::Activating | WorkerState::Activated) => {
            tracing::debug!(state = %proxy.state(), "activation already under way");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
