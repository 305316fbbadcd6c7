//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results. Params are always
//! passed by name (JSON object).

use serde::{Deserialize, Serialize};
use snippet_run_core::domain::SnippetFile;

/// handshake.v1 - Check the token and learn the agent version
#[derive(Debug, Deserialize)]
pub struct HandshakeRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// command.run.v1 - Run a snippet (subscription)
///
/// Notifications (`command.event.v1`) carry `ChannelEvent`s.
#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub token: String,
    pub channel: String,
    pub file: SnippetFile,
}

/// command.stop.v1 - Stop the invocation running on a channel
#[derive(Debug, Deserialize)]
pub struct StopRequest {
    pub token: String,
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopResponse {
    pub channel: String,
    /// False when nothing was running on the channel
    pub stopped: bool,
}

/// rules.list.v1 - Effective rule order
#[derive(Debug, Deserialize)]
pub struct RulesRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSummary {
    pub index: usize,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesResponse {
    pub rules: Vec<RuleSummary>,
}
