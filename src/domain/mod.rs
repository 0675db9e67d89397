//! Domain layer: streamed array types, trial payloads and recorded events.
//!
//! This module contains the trial-streaming data model: dtype parsing and
//! header validation for binary arrays, row-to-payload conversion for trial
//! tables, and the event bus that fans recorded events out to monitors.

pub mod array_header;
pub mod dtype;
pub mod event_bus;
pub mod recorded_event;
pub mod trial_row;

pub use array_header::{ArrayHeader, ArrayOrder};
pub use dtype::{DType, DTypeKind, Element};
pub use event_bus::EventBus;
pub use recorded_event::RecordedEvent;
pub use trial_row::{Cell, RowSelection, TrialRow};

/// Protocol version assumed when a message does not carry `proto`.
pub const DEFAULT_PROTO: &str = "v1";
