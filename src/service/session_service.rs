//! Session service: records trial frames and emits events.

use std::time::Instant;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{ArrayHeader, DEFAULT_PROTO, EventBus, RecordedEvent};
use crate::error::{ProtocolError, ServerError};
use crate::persistence::SessionStore;
use crate::ws::messages::TrialReply;

/// Event name announcing a binary frame.
pub const ARRAY_HEADER_EVENT: &str = "array_header";

/// Event name of the per-trial summary record.
pub const TRIAL_RECORD_EVENT: &str = "trial_record";

/// Per-connection protocol state.
///
/// A connection alternates between idle and "header received, waiting for
/// bytes"; the pending header is consumed by the next binary frame.
#[derive(Debug)]
pub struct ConnectionState {
    id: Uuid,
    pending: Option<ArrayHeader>,
}

impl ConnectionState {
    /// Creates the state for a newly accepted connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            pending: None,
        }
    }

    /// Connection identifier used in logs and recorded events.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The header waiting for its binary frame, if any.
    #[must_use]
    pub const fn pending_header(&self) -> Option<&ArrayHeader> {
        self.pending.as_ref()
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestration layer for trial streaming.
///
/// Owns the [`SessionStore`] for durable writes and an [`EventBus`] for
/// event emission. Every frame follows the pattern: validate → persist →
/// emit event → reply.
#[derive(Debug)]
pub struct SessionService {
    store: SessionStore,
    event_bus: EventBus,
    started: Instant,
}

impl SessionService {
    /// Creates a new `SessionService`.
    #[must_use]
    pub fn new(store: SessionStore, event_bus: EventBus) -> Self {
        Self {
            store,
            event_bus,
            started: Instant::now(),
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the inner [`SessionStore`].
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Monotonic receive timestamp in seconds since service start.
    fn receive_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Handles a text frame.
    ///
    /// Returns `None` for frames that are ignored without a reply
    /// (text that is not JSON).
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] when the session store cannot be written;
    /// the caller should close the connection.
    pub async fn handle_text(
        &self,
        text: &str,
        conn: &mut ConnectionState,
    ) -> Result<Option<TrialReply>, ServerError> {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            tracing::warn!(connection = %conn.id, text, "ignored non-JSON text");
            return Ok(None);
        };
        let Value::Object(mut obj) = value else {
            return Ok(Some(TrialReply::error(&ProtocolError::NotAnObject)));
        };

        let event = obj.get("event").and_then(Value::as_str).map(str::to_string);
        let proto = obj
            .get("proto")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTO)
            .to_string();
        obj.insert("t_recv".to_string(), Value::from(self.receive_time()));

        let reply = if event.as_deref() == Some(ARRAY_HEADER_EVENT) {
            self.handle_array_header(obj, conn).await?
        } else {
            self.handle_control(obj, event, &proto, conn).await?
        };
        Ok(Some(reply))
    }

    async fn handle_array_header(
        &self,
        obj: Map<String, Value>,
        conn: &mut ConnectionState,
    ) -> Result<TrialReply, ServerError> {
        let header = match ArrayHeader::from_object(&obj) {
            Ok(header) => header,
            Err(err) => {
                tracing::warn!(connection = %conn.id, reason = %err, "array_header rejected");
                return Ok(TrialReply::error(&err));
            }
        };

        self.store.record_header(&obj).await?;

        let reply = TrialReply::header_ack(&header);
        if let Some(previous) = conn.pending.replace(header) {
            tracing::warn!(
                connection = %conn.id,
                name = %previous.name,
                trial = previous.trial,
                "array_header replaced before its bytes arrived"
            );
        }
        Ok(reply)
    }

    async fn handle_control(
        &self,
        obj: Map<String, Value>,
        event: Option<String>,
        proto: &str,
        conn: &ConnectionState,
    ) -> Result<TrialReply, ServerError> {
        if event.as_deref() == Some(TRIAL_RECORD_EVENT) {
            log_trial_record(&obj);
        }

        let trial = obj.get("trial").cloned().unwrap_or(Value::Null);
        let record = Value::Object(obj);
        self.store.record_control(&record).await?;

        tracing::debug!(connection = %conn.id, event = ?event, "control event recorded");
        let reply = TrialReply::control_ack(event.clone(), trial.clone(), proto);

        let _ = self.event_bus.publish(RecordedEvent::Control {
            connection_id: conn.id,
            event,
            trial,
            record,
            recorded_at: Utc::now(),
        });
        Ok(reply)
    }

    /// Handles a binary frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] when the array file cannot be written;
    /// the caller should close the connection.
    pub async fn handle_binary(
        &self,
        bytes: &[u8],
        conn: &mut ConnectionState,
    ) -> Result<TrialReply, ServerError> {
        let Some(header) = conn.pending.take() else {
            tracing::warn!(connection = %conn.id, "unexpected binary without header; ignoring");
            return Ok(TrialReply::error(&ProtocolError::BinaryWithoutHeader));
        };

        if let Err(err) = header.check_payload(bytes) {
            tracing::error!(
                connection = %conn.id,
                name = %header.name,
                trial = header.trial,
                shape = ?header.shape,
                dtype = %header.dtype_label,
                received = bytes.len(),
                "reshape failed"
            );
            return Ok(TrialReply::error(&err));
        }

        let path = self.store.save_array(&header, bytes).await?;
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(
            name = %header.name,
            trial = header.trial,
            shape = ?header.shape,
            file = %file,
            "saved array"
        );

        let reply = TrialReply::bytes_ack(&header);
        let _ = self.event_bus.publish(RecordedEvent::ArraySaved {
            connection_id: conn.id,
            name: header.name,
            trial: header.trial,
            shape: header.shape,
            dtype: header.dtype_label,
            file,
            recorded_at: Utc::now(),
        });
        Ok(reply)
    }
}

/// One-line summary of a `trial_record` control event.
fn log_trial_record(obj: &Map<String, Value>) {
    let field = |key: &str| obj.get(key).cloned().unwrap_or(Value::Null);
    let seconds = |key: &str| obj.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    tracing::info!(
        trial = %field("trial"),
        acc = %field("Acceptance"),
        succ = %field("success"),
        rew = %field("reward"),
        eff = %field("effort"),
        dt = format_args!("{:.3}", seconds("DecisionTime")),
        rt = format_args!("{:.3}", seconds("ReactionTimeEP")),
        "trial record"
    );
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn make_service() -> (SessionService, tempfile::TempDir) {
        let Ok(dir) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let Ok(store) = SessionStore::open(dir.path()).await else {
            panic!("store");
        };
        (SessionService::new(store, EventBus::new(64)), dir)
    }

    fn reply_json(reply: Option<TrialReply>) -> Value {
        let Some(reply) = reply else {
            panic!("expected a reply");
        };
        serde_json::to_value(&reply).unwrap_or_default()
    }

    #[tokio::test]
    async fn non_json_text_is_ignored() {
        let (service, _dir) = make_service().await;
        let mut conn = ConnectionState::new();
        let result = service.handle_text("hello", &mut conn).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn non_object_json_is_rejected() {
        let (service, _dir) = make_service().await;
        let mut conn = ConnectionState::new();
        let Ok(reply) = service.handle_text("[1,2]", &mut conn).await else {
            panic!("no server error");
        };
        let reply = reply_json(reply);
        assert_eq!(reply, json!({"event": "error", "reason": "not_an_object"}));
    }

    #[tokio::test]
    async fn control_event_is_persisted_once_and_acked() {
        let (service, dir) = make_service().await;
        let mut rx = service.event_bus().subscribe();
        let mut conn = ConnectionState::new();

        let text = r#"{"event":"DMphase","trial":2,"dur_DMphase":4,"Effort":0.95,"Reward":1}"#;
        let Ok(reply) = service.handle_text(text, &mut conn).await else {
            panic!("no server error");
        };
        let reply = reply_json(reply);
        assert_eq!(
            reply,
            json!({"event": "ack", "ack_of": "DMphase", "trial": 2, "proto": "v1"})
        );

        let Ok(log) =
            tokio::fs::read_to_string(dir.path().join("control_events.jsonl")).await
        else {
            panic!("control log");
        };
        assert_eq!(log.lines().count(), 1);
        let Ok(stored) = serde_json::from_str::<Value>(log.trim()) else {
            panic!("stored line is JSON");
        };
        assert!(stored.get("t_recv").is_some_and(Value::is_f64));
        assert_eq!(stored.get("Effort"), Some(&json!(0.95)));

        let Ok(event) = rx.recv().await else {
            panic!("expected recorded event");
        };
        assert_eq!(event.event_name(), "DMphase");
        assert_eq!(event.connection_id(), conn.id());
    }

    #[tokio::test]
    async fn control_without_event_acks_null() {
        let (service, _dir) = make_service().await;
        let mut conn = ConnectionState::new();
        let Ok(reply) = service.handle_text(r#"{"proto":"v2"}"#, &mut conn).await else {
            panic!("no server error");
        };
        assert_eq!(
            reply_json(reply),
            json!({"event": "ack", "ack_of": null, "trial": null, "proto": "v2"})
        );
    }

    #[tokio::test]
    async fn header_missing_keys_keeps_previous_pending() {
        let (service, _dir) = make_service().await;
        let mut conn = ConnectionState::new();
        let good = r#"{"event":"array_header","name":"a","trial":1,"dtype":"uint8","shape":[2]}"#;
        let _ = service.handle_text(good, &mut conn).await;
        assert!(conn.pending_header().is_some());

        let Ok(reply) = service
            .handle_text(r#"{"event":"array_header","name":"b"}"#, &mut conn)
            .await
        else {
            panic!("no server error");
        };
        assert_eq!(
            reply_json(reply),
            json!({"event": "error", "reason": "missing:trial,dtype,shape"})
        );
        assert_eq!(conn.pending_header().map(|h| h.name.as_str()), Some("a"));
    }

    #[tokio::test]
    async fn newer_header_replaces_pending() {
        let (service, dir) = make_service().await;
        let mut conn = ConnectionState::new();
        let first = r#"{"event":"array_header","name":"first","trial":1,"dtype":"uint8","shape":[2]}"#;
        let second = r#"{"event":"array_header","name":"second","trial":1,"dtype":"uint8","shape":[3]}"#;
        let _ = service.handle_text(first, &mut conn).await;
        let _ = service.handle_text(second, &mut conn).await;
        assert_eq!(conn.pending_header().map(|h| h.name.as_str()), Some("second"));

        let Ok(reply) = service.handle_binary(&[1, 2, 3], &mut conn).await else {
            panic!("no server error");
        };
        let reply = serde_json::to_value(&reply).unwrap_or_default();
        assert_eq!(reply.get("name"), Some(&json!("second")));
        assert!(!dir.path().join("first").exists());

        // the first header's bytes have nothing left to attach to
        let Ok(reply) = service.handle_binary(&[1, 2], &mut conn).await else {
            panic!("no server error");
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap_or_default(),
            json!({"event": "error", "reason": "binary_without_header"})
        );
        assert!(!dir.path().join("first").exists());
    }

    #[tokio::test]
    async fn unwritable_store_is_server_error() {
        let (service, dir) = make_service().await;
        let mut conn = ConnectionState::new();
        let Ok(()) = tokio::fs::remove_dir_all(dir.path()).await else {
            panic!("remove save dir");
        };

        let result = service
            .handle_text(r#"{"event":"ITI","trial":1}"#, &mut conn)
            .await;
        assert!(matches!(result, Err(ServerError::Io(_))));
    }

    #[tokio::test]
    async fn header_then_bytes_saves_array() {
        let (service, dir) = make_service().await;
        let mut rx = service.event_bus().subscribe();
        let mut conn = ConnectionState::new();

        let header = r#"{"event":"array_header","proto":"v1","name":"cursor_trace","trial":5,"dtype":"float32","shape":[2,2],"order":"C"}"#;
        let Ok(reply) = service.handle_text(header, &mut conn).await else {
            panic!("no server error");
        };
        assert_eq!(
            reply_json(reply),
            json!({"event": "ack", "ack_of": "array_header", "name": "cursor_trace", "trial": 5, "proto": "v1"})
        );

        let Ok(reply) = service.handle_binary(&[0u8; 16], &mut conn).await else {
            panic!("no server error");
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap_or_default(),
            json!({"event": "ack", "ack_of": "array_bytes", "name": "cursor_trace", "trial": 5, "shape": [2, 2], "dtype": "float32"})
        );
        assert!(conn.pending_header().is_none());

        let Ok(mut entries) = tokio::fs::read_dir(dir.path().join("cursor_trace")).await else {
            panic!("array dir");
        };
        let Ok(Some(entry)) = entries.next_entry().await else {
            panic!("one array file");
        };
        assert!(entry.file_name().to_string_lossy().starts_with("cursor_trace_trial5_"));

        let Ok(headers) =
            tokio::fs::read_to_string(dir.path().join("array_headers.jsonl")).await
        else {
            panic!("header log");
        };
        assert_eq!(headers.lines().count(), 1);

        let Ok(event) = rx.recv().await else {
            panic!("expected recorded event");
        };
        assert_eq!(event.event_name(), "array_saved");
    }

    #[tokio::test]
    async fn binary_without_header_is_rejected() {
        let (service, _dir) = make_service().await;
        let mut conn = ConnectionState::new();
        let Ok(reply) = service.handle_binary(&[1, 2, 3], &mut conn).await else {
            panic!("no server error");
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap_or_default(),
            json!({"event": "error", "reason": "binary_without_header"})
        );
    }

    #[tokio::test]
    async fn wrong_length_consumes_header() {
        let (service, _dir) = make_service().await;
        let mut conn = ConnectionState::new();
        let header = r#"{"event":"array_header","name":"a","trial":1,"dtype":"int16","shape":[3]}"#;
        let _ = service.handle_text(header, &mut conn).await;

        let Ok(reply) = service.handle_binary(&[0u8; 5], &mut conn).await else {
            panic!("no server error");
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap_or_default(),
            json!({"event": "error", "reason": "reshape_failed"})
        );
        assert!(conn.pending_header().is_none());

        let Ok(reply) = service.handle_binary(&[0u8; 6], &mut conn).await else {
            panic!("no server error");
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap_or_default(),
            json!({"event": "error", "reason": "binary_without_header"})
        );
    }

    #[tokio::test]
    async fn trial_record_is_persisted() {
        let (service, dir) = make_service().await;
        let mut conn = ConnectionState::new();
        let text = r#"{"event":"trial_record","trial":1,"Acceptance":1,"success":1,"reward":20,"effort":0.95,"DecisionTime":2.0,"ReactionTimeEP":null}"#;
        let Ok(reply) = service.handle_text(text, &mut conn).await else {
            panic!("no server error");
        };
        assert_eq!(
            reply_json(reply).get("ack_of"),
            Some(&json!("trial_record"))
        );
        let log = tokio::fs::read_to_string(dir.path().join("control_events.jsonl")).await;
        assert!(log.is_ok_and(|l| l.contains("ReactionTimeEP")));
    }
}
