//! Events recorded by the trial route.
//!
//! Every persisted control event and every saved array emits a
//! [`RecordedEvent`] through the [`super::EventBus`], where monitor
//! connections pick it up.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Event name used for saved arrays in monitor subscriptions.
pub const ARRAY_SAVED: &str = "array_saved";

/// Domain event emitted after something was written to the session store.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedEvent {
    /// A control event was appended to `control_events.jsonl`.
    Control {
        /// Trial connection that sent the event.
        connection_id: Uuid,
        /// Event name, if the client sent one.
        event: Option<String>,
        /// Trial number as sent by the client (may be `null`).
        trial: Value,
        /// The stored record, including `t_recv`.
        record: Value,
        /// Wall-clock time of recording.
        recorded_at: DateTime<Utc>,
    },

    /// An array was saved as `.npy`.
    ArraySaved {
        /// Trial connection that sent the array.
        connection_id: Uuid,
        /// Array name.
        name: String,
        /// Trial number.
        trial: i64,
        /// Array dimensions.
        shape: Vec<usize>,
        /// Dtype as announced by the client.
        dtype: String,
        /// File name under the array's directory.
        file: String,
        /// Wall-clock time of recording.
        recorded_at: DateTime<Utc>,
    },
}

impl RecordedEvent {
    /// Name used to match monitor subscriptions: the control event name,
    /// or [`ARRAY_SAVED`].
    #[must_use]
    pub fn event_name(&self) -> &str {
        match self {
            Self::Control { event, .. } => event.as_deref().unwrap_or(""),
            Self::ArraySaved { .. } => ARRAY_SAVED,
        }
    }

    /// Connection that produced the event.
    #[must_use]
    pub const fn connection_id(&self) -> Uuid {
        match self {
            Self::Control { connection_id, .. } | Self::ArraySaved { connection_id, .. } => {
                *connection_id
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn control_event_name() {
        let event = RecordedEvent::Control {
            connection_id: Uuid::new_v4(),
            event: Some("DMphase".to_string()),
            trial: json!(1),
            record: json!({"event": "DMphase"}),
            recorded_at: Utc::now(),
        };
        assert_eq!(event.event_name(), "DMphase");
    }

    #[test]
    fn array_saved_serializes_with_kind_tag() {
        let id = Uuid::new_v4();
        let event = RecordedEvent::ArraySaved {
            connection_id: id,
            name: "cursor_trace".to_string(),
            trial: 2,
            shape: vec![10],
            dtype: "float32".to_string(),
            file: "cursor_trace_trial2_20260101_120000.npy".to_string(),
            recorded_at: Utc::now(),
        };
        assert_eq!(event.event_name(), ARRAY_SAVED);
        assert_eq!(event.connection_id(), id);
        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("\"kind\":\"array_saved\""));
        assert!(json.contains("cursor_trace"));
    }
}
