use serde::{Deserialize, Serialize};

/// Type tag of an event from the proxy backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    /// `content` is a delta to append.
    Message,

    /// `content`, if present, is the authoritative final text.
    CompletedMessage,

    /// No further events will follow.
    StreamEnd,

    /// Any type this client does not understand.
    #[serde(other)]
    Unknown,
}

/// An event decoded from a `data:` line of the proxy's event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamEvent {
    /// The event type.
    #[serde(rename = "type")]
    pub kind: StreamEventType,

    /// Text carried by the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl StreamEvent {
    /// A `message` delta.
    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            kind: StreamEventType::Message,
            content: Some(content.into()),
        }
    }

    /// A `completed_message` event.
    pub fn completed(content: Option<String>) -> Self {
        Self {
            kind: StreamEventType::CompletedMessage,
            content,
        }
    }

    /// A `stream_end` event.
    pub fn end() -> Self {
        Self {
            kind: StreamEventType::StreamEnd,
            content: None,
        }
    }
}
