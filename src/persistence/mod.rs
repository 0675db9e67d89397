//! Persistence layer: JSON Lines logs and `.npy` array files.
//!
//! [`SessionStore`] owns the save directory. Control events and array
//! headers are appended to JSON Lines files; array payloads are written
//! as NumPy `.npy` files, one subdirectory per array name.

pub mod jsonl;
pub mod npy;
pub mod store;

pub use jsonl::JsonlLog;
pub use store::SessionStore;
