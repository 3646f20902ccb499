//! Snapshot persistence of the session registry.
//!
//! Snapshots are JSON arrays of session records written to
//! `<data_dir>/sessions.json`. Loading is best-effort: records that do not
//! parse are skipped, a missing file is an empty snapshot.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use camsync_platforms::SessionState;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{Error, Result};

/// File name of the snapshot inside the data directory.
pub const SNAPSHOT_FILE_NAME: &str = "sessions.json";

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, sessions: &[SessionState]) -> Result<()>;

    async fn load(&self) -> Result<Vec<SessionState>>;
}

/// Stores snapshots as pretty-printed JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SNAPSHOT_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_records(content: &str) -> Result<Vec<SessionState>> {
        let records: Vec<Value> = match serde_json::from_str(content)? {
            Value::Array(records) => records,
            _ => return Err(Error::persistence("snapshot is not a JSON array")),
        };

        let total = records.len();
        let sessions: Vec<SessionState> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match serde_json::from_value(record) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed session record");
                    None
                }
            })
            .collect();

        if sessions.len() < total {
            warn!(
                loaded = sessions.len(),
                skipped = total - sessions.len(),
                "Snapshot partially loaded"
            );
        }
        Ok(sessions)
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn save(&self, sessions: &[SessionState]) -> Result<()> {
        let json = serde_json::to_string_pretty(sessions)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::persistence(format!("creating {}: {e}", parent.display()))
            })?;
        }

        // write atomically using a temp file
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &json).await.map_err(|e| {
            Error::persistence(format!("writing {}: {e}", temp_path.display()))
        })?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::persistence(format!("renaming to {}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), count = sessions.len(), "Snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<SessionState>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot found");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(Error::persistence(format!(
                    "reading {}: {e}",
                    self.path.display()
                )));
            }
        };

        let sessions = Self::parse_records(&content)?;
        debug!(path = %self.path.display(), count = sessions.len(), "Snapshot loaded");
        Ok(sessions)
    }
}

/// Keeps snapshots in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    saved: Mutex<Vec<Vec<SessionState>>>,
    initial: Vec<SessionState>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose first `load` returns `records`.
    pub fn with_records(records: Vec<SessionState>) -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            initial: records,
        }
    }

    pub fn save_count(&self) -> usize {
        self.saved.lock().len()
    }

    pub fn last_saved(&self) -> Option<Vec<SessionState>> {
        self.saved.lock().last().cloned()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, sessions: &[SessionState]) -> Result<()> {
        self.saved.lock().push(sessions.to_vec());
        Ok(())
    }

    async fn load(&self) -> Result<Vec<SessionState>> {
        Ok(self
            .last_saved()
            .unwrap_or_else(|| self.initial.clone()))
    }
}
