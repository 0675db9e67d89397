//! Append-only JSON Lines log.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::ServerError;

/// A `.jsonl` file that receives one JSON object per line.
///
/// Appends from concurrent connections are serialized so lines never
/// interleave.
#[derive(Debug)]
pub struct JsonlLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlLog {
    /// Creates a log writing to `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record` as a new line.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Serialization`] if `record` cannot be encoded
    /// or [`ServerError::Io`] if the file cannot be written.
    pub async fn append<T: Serialize + ?Sized>(&self, record: &T) -> Result<(), ServerError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
