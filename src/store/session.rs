//! Durable session storage.
//!
//! The session lives at `{state_dir}/cookies.json` as a JSON array of cookie
//! records. Loading fails soft: an individually corrupt record is dropped
//! with a warning and loading continues; a file with zero salvageable
//! records counts as no session at all.

use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, warn};

use crate::source::SessionCookie;
use crate::store::error::{StorageError, StorageResult};

/// Session file name inside the state directory.
pub const SESSION_FILE: &str = "cookies.json";

#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: state_dir.into().join(SESSION_FILE),
        }
    }

    /// Load the persisted session, or `None` when there is nothing usable.
    ///
    /// Read and parse failures are logged, never surfaced; the caller's
    /// fallback is a fresh login either way.
    pub async fn load(&self) -> Option<Vec<SessionCookie>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no session file");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read session file");
                return None;
            }
        };

        let records: Vec<serde_json::Value> = match serde_json::from_str(&contents) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "session file is not a JSON array, ignoring");
                return None;
            }
        };

        let total = records.len();
        let mut session = Vec::with_capacity(total);
        for record in records {
            match serde_json::from_value::<SessionCookie>(record) {
                Ok(cookie) => session.push(cookie),
                Err(e) => warn!(error = %e, "dropping malformed session record"),
            }
        }

        if session.is_empty() {
            return None;
        }
        debug!(loaded = session.len(), total, "loaded session");
        Some(session)
    }

    /// Replace the stored session with `session`.
    ///
    /// Writes to a temp file first, then renames; a crashed write never
    /// leaves a truncated session file behind.
    pub async fn save(&self, session: &[SessionCookie]) -> StorageResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| StorageError::file_io(dir, e))?;
        }

        let json = serde_json::to_string_pretty(session)
            .map_err(|e| StorageError::serialization(e.to_string()))?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json.as_bytes())
            .await
            .map_err(|e| StorageError::file_io(&temp_path, e))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| StorageError::file_io(&self.path, e))?;

        Ok(())
    }
}
