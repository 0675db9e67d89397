//! Condition scripts for the EBDM paradigm.
//!
//! Each experimental condition is a fixed sequence of timed phase events
//! (preparation, offer, feedback, effort, inter-trial interval). A
//! [`TrialScript`] describes the sequence; [`run_script`] plays it against
//! a [`TrialSink`] in real time.

pub mod runner;
pub mod script;

pub use runner::{TrialSink, run_script};
pub use script::{Condition, CursorStream, TrialOutcome, TrialScript, TrialStep};
