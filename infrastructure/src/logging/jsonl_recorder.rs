//! JSONL file writer for agent-session events.
//!
//! Each [`SessionEvent`] is serialized as a single JSON line with `type`,
//! `timestamp`, `sessionId` and `ownerId` fields merged into its payload,
//! appended to the file via a buffered writer.

use async_trait::async_trait;
use relay_application::{SessionRecorder, SinkError};
use relay_domain::SessionEvent;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Session recorder that appends one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes after every record
/// and on `Drop`.
pub struct JsonlSessionRecorder {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlSessionRecorder {
    /// Open (or create) the log at `path` for appending.
    ///
    /// Creates parent directories as needed. Returns `None` if the file
    /// cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create session log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open session log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn to_record(event: SessionEvent) -> serde_json::Value {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut record = match event.payload {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        record.insert("type".to_string(), event.kind.as_str().into());
        record.insert("timestamp".to_string(), timestamp.into());
        record.insert("sessionId".to_string(), event.session_id.into());
        record.insert("ownerId".to_string(), event.owner_id.into());
        serde_json::Value::Object(record)
    }
}

#[async_trait]
impl SessionRecorder for JsonlSessionRecorder {
    async fn record_event(&self, event: SessionEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(&Self::to_record(event))
            .map_err(|e| SinkError::WriteFailed(e.to_string()))?;

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line).map_err(|e| SinkError::WriteFailed(e.to_string()))?;
        // JSONL is append-only; flush each record for crash safety
        writer
            .flush()
            .map_err(|e| SinkError::WriteFailed(e.to_string()))
    }
}

impl Drop for JsonlSessionRecorder {
    fn drop(&mut self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writer.flush();
    }
}
