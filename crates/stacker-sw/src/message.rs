//! Messages posted from the page to a worker.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A page → worker message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Activate now instead of waiting for controlled pages to close.
    SkipWaiting,
}

impl ClientMessage {
    /// Decode a posted message; anything unrecognised is `None`.
    pub fn from_value(data: &JsonValue) -> Option<Self> {
        serde_json::from_value(data.clone()).ok()
    }

    pub fn to_value(self) -> JsonValue {
        match self {
            ClientMessage::SkipWaiting => serde_json::json!({ "type": "SKIP_WAITING" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_skip_waiting_wire_shape() {
        let value = serde_json::to_value(ClientMessage::SkipWaiting).unwrap();
        assert_eq!(value, json!({ "type": "SKIP_WAITING" }));
        assert_eq!(ClientMessage::SkipWaiting.to_value(), value);
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            ClientMessage::from_value(&json!({ "type": "SKIP_WAITING" })),
            Some(ClientMessage::SkipWaiting)
        );
        assert_eq!(ClientMessage::from_value(&json!({ "type": "PING" })), None);
        assert_eq!(ClientMessage::from_value(&json!("SKIP_WAITING")), None);
        assert_eq!(ClientMessage::from_value(&json!(null)), None);
    }
}
