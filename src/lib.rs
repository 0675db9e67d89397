//! # ebdm-trial-server
//!
//! WebSocket server recording trial events and numeric arrays streamed by
//! an effort-based decision making VR experiment, plus the client used to
//! stream them and scripted conditions for testing without the headset.
//!
//! Control events are appended to JSON Lines logs. Arrays arrive as an
//! `array_header` text frame followed by one binary frame and are saved
//! as `.npy` files under the session directory.
//!
//! ## Architecture
//!
//! ```text
//! Experiment (TrialStreamer, scenario scripts)
//!     │
//!     ├── Trial route /trials (ws/)     Monitors /monitor (ws/)
//!     ├── Status endpoints (api/)               │
//!     │                                          │
//!     ├── SessionService (service/) ──► EventBus (domain/)
//!     │
//!     └── SessionStore (persistence/)
//!             ├── control_events.jsonl, array_headers.jsonl
//!             └── <name>/<name>_trial<N>_<stamp>.npy
//! ```

pub mod api;
pub mod app_state;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod scenario;
pub mod server;
pub mod service;
pub mod ws;
