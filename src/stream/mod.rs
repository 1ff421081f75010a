//! Event-stream framing shared by the relay and the client.
//!
//! Every event travels as a single `data: <json>\n\n` frame so a reader
//! can split the body on blank lines without understanding the payload.

mod decoder;
pub use decoder::FrameDecoder;

use serde::{Deserialize, Serialize};

pub const DATA_PREFIX: &str = "data: ";
pub const FRAME_DELIMITER: &str = "\n\n";

/// One event emitted by the relay for a single request. Exactly one
/// terminal event (`Done` or `Error`) ends every stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Delta {
        text: String,
    },
    Done,
    Error {
        message: String,
        code: Option<u16>,
        retry_after: Option<u64>,
    },
}

// The JSON shape on the wire. `done` is always written so clients can
// tell a terminal frame apart without looking at the other fields.
#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct WireEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(default)]
    done: bool,
}

impl StreamEvent {
    pub fn delta(text: &str) -> Self {
        StreamEvent::Delta {
            text: text.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    /// JSON payload of the event, without framing.
    pub fn to_payload(&self) -> String {
        let wire = match self {
            StreamEvent::Delta { text } => WireEvent {
                text: Some(text.clone()),
                done: false,
                ..Default::default()
            },
            StreamEvent::Done => WireEvent {
                text: Some(String::new()),
                done: true,
                ..Default::default()
            },
            StreamEvent::Error {
                message,
                code,
                retry_after,
            } => WireEvent {
                error: Some(message.clone()),
                code: *code,
                retry_after: *retry_after,
                done: true,
                ..Default::default()
            },
        };
        // Serializing a struct of strings and integers can't fail
        serde_json::to_string(&wire).unwrap_or_default()
    }

    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        let wire: WireEvent = serde_json::from_str(payload)?;
        let event = if let Some(message) = wire.error {
            StreamEvent::Error {
                message,
                code: wire.code,
                retry_after: wire.retry_after,
            }
        } else if wire.done {
            StreamEvent::Done
        } else {
            StreamEvent::Delta {
                text: wire.text.unwrap_or_default(),
            }
        };
        Ok(event)
    }

    /// The event as a complete frame, ready to be written to the body.
    pub fn encode(&self) -> String {
        format!("{}{}{}", DATA_PREFIX, self.to_payload(), FRAME_DELIMITER)
    }
}
