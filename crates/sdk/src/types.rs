//! SDK Request/Response Types
//!
//! Mirrors the JSON-RPC types from the api-rpc crate.

use serde::{Deserialize, Serialize};

/// Snippet file sent with `command.run.v1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub filename: String,
    #[serde(default)]
    pub filetype: String,
    pub content: String,
}

impl FileSpec {
    pub fn new(
        filename: impl Into<String>,
        filetype: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            filetype: filetype.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Event of a running snippet: output chunks, then one exit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RunEvent {
    Output { data: String, stream: OutputStream },
    Exit { code: i32 },
}

/// `command.event.v1` notification payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub channel: String,
    pub event: RunEvent,
}

/// Response from handshake
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeResponse {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub uptime_seconds: u64,
}

/// Response from stop
#[derive(Debug, Clone, Deserialize)]
pub struct StopResponse {
    pub channel: String,
    pub stopped: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSummary {
    pub index: usize,
    pub label: String,
}

/// Response from rules listing (evaluation order)
#[derive(Debug, Clone, Deserialize)]
pub struct RulesResponse {
    pub rules: Vec<RuleSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event: ChannelEvent = serde_json::from_str(
            r#"{"channel":"c1","event":{"type":"output","data":"hi\n","stream":"stdout"}}"#,
        )
        .unwrap();
        assert_eq!(
            event.event,
            RunEvent::Output {
                data: "hi\n".to_string(),
                stream: OutputStream::Stdout
            }
        );

        let exit: RunEvent = serde_json::from_str(r#"{"type":"exit","code":127}"#).unwrap();
        assert_eq!(exit, RunEvent::Exit { code: 127 });
    }
}
