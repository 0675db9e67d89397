//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! Two endpoints share this layer: the trial route (default `/trials`)
//! where experiment clients stream control events and arrays, and
//! `/monitor` where observers subscribe to what the server recorded.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
