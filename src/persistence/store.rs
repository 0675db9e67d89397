//! Session save directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::JsonlLog;
use super::npy;
use crate::domain::ArrayHeader;
use crate::error::ServerError;

/// File receiving control events.
pub const CONTROL_EVENTS_FILE: &str = "control_events.jsonl";

/// File receiving array headers.
pub const ARRAY_HEADERS_FILE: &str = "array_headers.jsonl";

/// Upper bound on `_<n>` suffixes tried when a file name is taken.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Everything a session writes lives under one root directory:
///
/// ```text
/// <root>/control_events.jsonl
/// <root>/array_headers.jsonl
/// <root>/<name>/<name>_trial<trial>_<YYYYmmdd_HHMMSS>.npy
/// ```
#[derive(Debug)]
pub struct SessionStore {
    root: PathBuf,
    control: JsonlLog,
    headers: JsonlLog,
}

impl SessionStore {
    /// Opens (and creates if needed) the save directory.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            control: JsonlLog::new(root.join(CONTROL_EVENTS_FILE)),
            headers: JsonlLog::new(root.join(ARRAY_HEADERS_FILE)),
            root,
        })
    }

    /// Root directory as configured.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute form of the root directory.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the directory no longer exists.
    pub async fn absolute_root(&self) -> Result<PathBuf, ServerError> {
        Ok(fs::canonicalize(&self.root).await?)
    }

    /// Appends a control event record.
    ///
    /// # Errors
    ///
    /// Propagates [`JsonlLog::append`] failures.
    pub async fn record_control<T: Serialize + ?Sized>(
        &self,
        record: &T,
    ) -> Result<(), ServerError> {
        self.control.append(record).await
    }

    /// Appends an array header record.
    ///
    /// # Errors
    ///
    /// Propagates [`JsonlLog::append`] failures.
    pub async fn record_header<T: Serialize + ?Sized>(
        &self,
        record: &T,
    ) -> Result<(), ServerError> {
        self.headers.append(record).await
    }

    /// Writes `data` as a `.npy` file described by `header` and returns
    /// its path. Never overwrites an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the file cannot be created or
    /// written, or [`ServerError::Internal`] if no free file name is found.
    pub async fn save_array(
        &self,
        header: &ArrayHeader,
        data: &[u8],
    ) -> Result<PathBuf, ServerError> {
        let dir = self.root.join(&header.name);
        fs::create_dir_all(&dir).await?;

        let stem = format!(
            "{}_trial{}_{}",
            header.name,
            header.trial,
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let bytes = npy::encode(&header.dtype, &header.shape, header.order, data);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let file_name = if attempt == 0 {
                format!("{stem}.npy")
            } else {
                format!("{stem}_{attempt}.npy")
            };
            let path = dir.join(file_name);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&bytes).await?;
                    file.flush().await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServerError::Internal(format!(
            "no free file name for {stem}.npy"
        )))
    }
}
