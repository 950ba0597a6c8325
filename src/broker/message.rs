use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Ready-made payload type for callers that do not bring their own.
///
/// The broker itself is generic over the payload and never inspects it; this
/// struct is what the `fanout` demo binary publishes. It carries the message
/// content and the moment it was created.
///
/// # Fields
///
/// - `payload` - The actual message content, usually a JSON-encoded string.
/// - `timestamp` - Milliseconds since the Unix epoch at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub payload: String,
    pub timestamp: i64,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}
