//! Wire envelope and system notices.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// System notices
// ---------------------------------------------------------------------------

/// Broadcast to the other members when a connection joins.
pub const NOTICE_CONNECTED: &str = "/New socket connected";

/// Broadcast to the remaining members when a connection leaves.
pub const NOTICE_DISCONNECTED: &str = "/A socket disconnected";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A message exchanged over the wire.
///
/// Every field is optional. Absent fields are omitted from the JSON rather than
/// encoded as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Reserved. Fan-out always goes to every member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Envelope {
    /// A message typed by a client, tagged with its connection id.
    pub fn message(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: non_empty(sender.into()),
            recipient: None,
            content: non_empty(content.into()),
        }
    }

    /// A system-generated notice. Notices carry no sender.
    pub fn notice(content: &str) -> Self {
        Self {
            sender: None,
            recipient: None,
            content: non_empty(content.to_string()),
        }
    }

    /// Whether this envelope was generated by the hub itself.
    pub fn is_notice(&self) -> bool {
        self.sender.is_none()
    }

    /// Serialize into the frame payload shared by every recipient.
    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
