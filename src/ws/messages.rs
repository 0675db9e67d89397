//! WebSocket message types: trial replies and the monitor envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ArrayHeader;
use crate::error::ProtocolError;

/// Reply sent on the trial route after every handled frame.
///
/// Serialized with an `event` discriminator:
/// `{"event":"ack","ack_of":"DMphase","trial":1,"proto":"v1"}` or
/// `{"event":"error","reason":"binary_without_header"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrialReply {
    /// The frame was recorded.
    Ack(Ack),
    /// The frame was rejected; the connection stays open.
    Error {
        /// Machine-readable rejection reason.
        reason: String,
    },
}

/// Acknowledgement body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    /// Event being acknowledged (`array_bytes` for binary frames).
    pub ack_of: Option<String>,
    /// Array name, for array acknowledgements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Trial number as received.
    #[serde(default)]
    pub trial: Value,
    /// Protocol version echoed back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proto: Option<String>,
    /// Array dimensions, for binary acknowledgements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    /// Dtype as announced, for binary acknowledgements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
}

impl TrialReply {
    /// Acknowledges a control event.
    #[must_use]
    pub fn control_ack(event: Option<String>, trial: Value, proto: &str) -> Self {
        Self::Ack(Ack {
            ack_of: event,
            name: None,
            trial,
            proto: Some(proto.to_string()),
            shape: None,
            dtype: None,
        })
    }

    /// Acknowledges an accepted `array_header`.
    #[must_use]
    pub fn header_ack(header: &ArrayHeader) -> Self {
        Self::Ack(Ack {
            ack_of: Some("array_header".to_string()),
            name: Some(header.name.clone()),
            trial: Value::from(header.trial),
            proto: Some(header.proto.clone()),
            shape: None,
            dtype: None,
        })
    }

    /// Acknowledges a saved binary frame.
    #[must_use]
    pub fn bytes_ack(header: &ArrayHeader) -> Self {
        Self::Ack(Ack {
            ack_of: Some("array_bytes".to_string()),
            name: Some(header.name.clone()),
            trial: Value::from(header.trial),
            proto: None,
            shape: Some(header.shape.clone()),
            dtype: Some(header.dtype_label.clone()),
        })
    }

    /// Reports a rejected frame.
    #[must_use]
    pub fn error(err: &ProtocolError) -> Self {
        Self::Error {
            reason: err.to_string(),
        }
    }

    /// Encodes the reply as a JSON text frame payload.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Top-level monitor message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Client-provided ID for requests; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: Value,
}

impl WsMessage {
    /// Builds a server-originated message stamped with the current time.
    #[must_use]
    pub fn new(id: String, msg_type: WsMessageType, payload: Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error message with a numeric code.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }
}

/// Discriminator for monitor message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Client → Server command.
    Command,
    /// Server → Client response to a command.
    Response,
    /// Server → Client recorded event.
    Event,
    /// Server → Client error.
    Error,
}

/// Commands a monitor can send in the envelope payload.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MonitorCommand {
    /// Subscribe to events by name. Use `["*"]` for all events.
    Subscribe {
        /// Event names.
        events: Vec<String>,
    },
    /// Unsubscribe from events by name.
    Unsubscribe {
        /// Event names.
        events: Vec<String>,
    },
}
