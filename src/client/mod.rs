//! Client side of the trial route.
//!
//! [`TrialStreamer`] keeps one WebSocket connection to the server and
//! streams control events and arrays over it without blocking the caller.

pub mod array;
pub mod streamer;

pub use array::ArrayPayload;
pub use streamer::TrialStreamer;

/// Errors raised by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The WebSocket handshake or transport failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Element count does not match the requested shape.
    #[error("shape {shape:?} needs {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Requested shape.
        shape: Vec<usize>,
        /// Elements implied by the shape.
        expected: usize,
        /// Elements supplied.
        actual: usize,
    },
}
