//! Service layer: per-frame handling for trial connections.
//!
//! The [`SessionService`] turns decoded WebSocket frames into session
//! store writes, replies and recorded events.

pub mod session_service;

pub use session_service::{ConnectionState, SessionService};
