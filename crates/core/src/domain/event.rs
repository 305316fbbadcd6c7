// Run Events - what an invocation reports back to its channel

use crate::domain::snippet::Channel;
use serde::{Deserialize, Serialize};

/// Which pipe a chunk came from
///
/// Presentation hint only: both pipes share the `output` event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Event emitted for one invocation
///
/// Zero or more `Output` events followed by exactly one `Exit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RunEvent {
    Output { data: String, stream: OutputStream },
    Exit { code: i32 },
}

impl RunEvent {
    pub fn output(stream: OutputStream, data: impl Into<String>) -> Self {
        RunEvent::Output {
            data: data.into(),
            stream,
        }
    }

    pub fn exit(code: i32) -> Self {
        RunEvent::Exit { code }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, RunEvent::Exit { .. })
    }
}

/// Event tagged with the channel it belongs to (transport payload)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    pub channel: Channel,
    pub event: RunEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_output_event_shape() {
        let event = RunEvent::output(OutputStream::Stderr, "boom\n");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "type": "output", "data": "boom\n", "stream": "stderr" })
        );
    }

    #[test]
    fn test_exit_event_shape() {
        let event = ChannelEvent {
            channel: "command_1".to_string(),
            event: RunEvent::exit(127),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "channel": "command_1", "event": { "type": "exit", "code": 127 } })
        );
        assert!(event.event.is_exit());
    }
}
