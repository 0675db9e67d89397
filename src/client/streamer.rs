//! Single-connection trial streamer.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::{ArrayPayload, ClientError};
use crate::ws::messages::TrialReply;

/// How long [`TrialStreamer::close`] waits for the server to finish the
/// closing handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Frames queued for the writer task.
#[derive(Debug)]
enum Outgoing {
    Text(String),
    /// Header and bytes of one array, written back to back.
    Array { header: String, bytes: Vec<u8> },
    Close,
}

/// Where the reader task hands server replies. Empty until
/// [`TrialStreamer::take_replies`] is called, so unread replies never
/// accumulate.
#[derive(Debug, Default)]
struct ReplySlot {
    tx: Mutex<Option<mpsc::UnboundedSender<TrialReply>>>,
}

impl ReplySlot {
    /// Opens the channel and returns its receiving end.
    fn open(&self) -> mpsc::UnboundedReceiver<TrialReply> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.tx.lock() {
            *slot = Some(tx);
        }
        rx
    }

    /// Forwards `reply` if someone is listening. Returns whether it was
    /// delivered.
    fn deliver(&self, reply: TrialReply) -> bool {
        let Ok(mut slot) = self.tx.lock() else {
            return false;
        };
        let delivered = slot.as_ref().is_some_and(|tx| tx.send(reply).is_ok());
        if !delivered {
            // receiver dropped or never taken
            *slot = None;
        }
        delivered
    }
}

/// One WebSocket connection streaming trial events and arrays.
///
/// Sends are fire-and-forget: they enqueue frames for a writer task that
/// owns the socket sink, so a caller driving experiment timing never waits
/// on the network. Frames leave in the order they were enqueued.
#[derive(Debug)]
pub struct TrialStreamer {
    uri: String,
    proto: String,
    started: Instant,
    outgoing: Option<mpsc::UnboundedSender<Outgoing>>,
    replies: Arc<ReplySlot>,
    replies_taken: bool,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl TrialStreamer {
    /// Connects to `uri` (e.g. `ws://127.0.0.1:8765/trials`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::WebSocket`] if the handshake fails.
    pub async fn connect(uri: &str, proto: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(uri).await?;
        let (mut sink, mut source) = stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outgoing>();
        let replies = Arc::new(ReplySlot::default());
        let reply_slot = Arc::clone(&replies);

        let writer = tokio::spawn(async move {
            while let Some(out) = out_rx.recv().await {
                let sent = match out {
                    Outgoing::Text(text) => sink.send(Message::text(text)).await,
                    Outgoing::Array { header, bytes } => {
                        match sink.send(Message::text(header)).await {
                            Ok(()) => sink.send(Message::binary(bytes)).await,
                            Err(e) => Err(e),
                        }
                    }
                    Outgoing::Close => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = sent {
                    tracing::warn!(error = %e, "send failed; streamer stopped");
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<TrialReply>(text.as_str()) {
                        Ok(reply) => {
                            if let TrialReply::Error { reason } = &reply {
                                tracing::warn!(%reason, "server rejected frame");
                            } else {
                                tracing::debug!(reply = %text.as_str(), "server ack");
                            }
                            reply_slot.deliver(reply);
                        }
                        Err(_) => tracing::debug!(text = %text.as_str(), "unrecognized server text"),
                    },
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(?frame, "server closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "receive failed");
                        break;
                    }
                }
            }
        });

        tracing::info!(uri, "connected");
        Ok(Self {
            uri: uri.to_string(),
            proto: proto.to_string(),
            started: Instant::now(),
            outgoing: Some(out_tx),
            replies,
            replies_taken: false,
            writer: Some(writer),
            reader: Some(reader),
        })
    }

    /// Server URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Whether frames can still be sent.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.outgoing.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Takes the stream of server replies. Returns `None` after the first
    /// call. Replies arriving before the call, or after the receiver is
    /// dropped, are discarded.
    pub fn take_replies(&mut self) -> Option<mpsc::UnboundedReceiver<TrialReply>> {
        if self.replies_taken {
            return None;
        }
        self.replies_taken = true;
        Some(self.replies.open())
    }

    /// Seconds since the streamer was created.
    fn send_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn enqueue(&self, out: Outgoing, what: &str) {
        let queued = self
            .outgoing
            .as_ref()
            .is_some_and(|tx| tx.send(out).is_ok());
        if !queued {
            tracing::warn!(what, "not connected; dropped");
        }
    }

    /// Sends a JSON control event. `event`, `proto` and `t_send` are added
    /// to `payload`, overriding keys of the same name.
    pub fn send_event(&self, event: &str, mut payload: Map<String, Value>) {
        payload.insert("event".to_string(), Value::from(event));
        payload.insert("proto".to_string(), Value::from(self.proto.as_str()));
        payload.insert("t_send".to_string(), Value::from(self.send_time()));
        match serde_json::to_string(&payload) {
            Ok(text) => self.enqueue(Outgoing::Text(text), event),
            Err(e) => tracing::warn!(event, error = %e, "event not serializable; dropped"),
        }
    }

    /// Sends an `array_header` immediately followed by the array bytes.
    pub fn send_array(&self, name: &str, array: &ArrayPayload, trial: i64, meta: Option<Value>) {
        let mut header = Map::new();
        header.insert("proto".to_string(), Value::from(self.proto.as_str()));
        header.insert("event".to_string(), Value::from("array_header"));
        header.insert("name".to_string(), Value::from(name));
        header.insert("trial".to_string(), Value::from(trial));
        header.insert("dtype".to_string(), Value::from(array.dtype().to_string()));
        header.insert("shape".to_string(), Value::from(array.shape().to_vec()));
        header.insert("order".to_string(), Value::from("C"));
        header.insert("t_send".to_string(), Value::from(self.send_time()));
        if let Some(meta) = meta {
            header.insert("meta".to_string(), meta);
        }
        match serde_json::to_string(&header) {
            Ok(text) => self.enqueue(
                Outgoing::Array {
                    header: text,
                    bytes: array.as_bytes().to_vec(),
                },
                name,
            ),
            Err(e) => tracing::warn!(name, error = %e, "header not serializable; dropped"),
        }
    }

    /// Flushes queued frames, closes the connection and waits for the
    /// background tasks.
    pub async fn close(&mut self) {
        if let Some(tx) = self.outgoing.take() {
            let _ = tx.send(Outgoing::Close);
        }
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
        if let Some(mut reader) = self.reader.take()
            && tokio::time::timeout(CLOSE_TIMEOUT, &mut reader).await.is_err()
        {
            reader.abort();
        }
        tracing::info!(uri = %self.uri, "closed");
    }
}

impl Drop for TrialStreamer {
    fn drop(&mut self) {
        if let Some(reader) = &self.reader {
            reader.abort();
        }
    }
}
