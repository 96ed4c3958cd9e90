//! Tagged stream events relayed from the generation task to the transport.
//!
//! Every exchange produces zero or more `Fragment` events followed by exactly
//! one terminal event (`Done` or `Error`); nothing is emitted after the
//! terminal event. The wire mapping is one JSON object per push event.

use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One incremental piece of the answer, in backend emission order.
    Fragment(String),
    /// Successful end of stream.
    Done,
    /// Terminal failure; the exchange produced no further output.
    Error(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }

    /// Wire representation: `{"text": ...}`, `{"done": true}` or
    /// `{"error": ...}`.
    pub fn to_json_value(&self) -> Value {
        match self {
            StreamEvent::Fragment(text) => json!({ "text": text }),
            StreamEvent::Done => json!({ "done": true }),
            StreamEvent::Error(message) => json!({ "error": message }),
        }
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_json_value())
    }
}
