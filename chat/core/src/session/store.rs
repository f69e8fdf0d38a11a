//! Session persistence
//!
//! Both operations work on whole snapshots; there is no incremental API.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::SessionMap;
use crate::error::StoreError;

/// Durable storage for the session map
pub trait SessionStore: Send + Sync {
    /// Load every saved session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage exists but cannot be
    /// read or parsed. Missing storage loads as an empty map.
    fn load(&self) -> Result<SessionMap, StoreError>;

    /// Replace the stored snapshot with `sessions`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the snapshot cannot be written.
    fn save(&self, sessions: &SessionMap) -> Result<(), StoreError>;
}

/// JSON file store
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write never leaves a truncated snapshot behind.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store sessions at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `$XDG_DATA_HOME/ragchat/sessions.json`
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("ragchat").join("sessions.json"))
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<SessionMap, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No session file yet");
                return Ok(SessionMap::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        if content.trim().is_empty() {
            return Ok(SessionMap::new());
        }

        let sessions: SessionMap =
            serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(
            path = %self.path.display(),
            sessions = sessions.len(),
            "Loaded sessions"
        );
        Ok(sessions)
    }

    fn save(&self, sessions: &SessionMap) -> Result<(), StoreError> {
        let json = serde_json::to_string(sessions)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        tracing::trace!(sessions = sessions.len(), "Saved sessions");
        Ok(())
    }
}

/// In-process store for headless runs and tests
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    snapshot: Mutex<SessionMap>,
    saves: Mutex<usize>,
}

impl MemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `sessions`
    #[must_use]
    pub fn with_sessions(sessions: SessionMap) -> Self {
        Self {
            snapshot: Mutex::new(sessions),
            saves: Mutex::new(0),
        }
    }

    /// Copy of the last saved snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionMap {
        self.snapshot.lock().clone()
    }

    /// Number of `save` calls so far
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<SessionMap, StoreError> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, sessions: &SessionMap) -> Result<(), StoreError> {
        *self.snapshot.lock() = sessions.clone();
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ChatMessage, Session, SessionId};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tokio_test::assert_ok;

    fn sample_sessions() -> SessionMap {
        let mut session = Session::new(SessionId::from("1700000000000"), "What is FAS?", 30);
        session.push(ChatMessage::user("What is FAS?"));
        session.push(ChatMessage::assistant(
            "An antimonopoly service.",
            vec![crate::protocol::SourceDoc::new("http://x", Some(0.9))],
        ));
        let mut map = SessionMap::new();
        map.insert(session.id.clone(), session);
        map
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("nope.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_roundtrip_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested/deeper/sessions.json"));
        let sessions = sample_sessions();

        assert_ok!(store.save(&sessions));
        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());
        assert_eq!(assert_ok!(store.load()), sessions);
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = FileSessionStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn test_file_store_snapshot_shape() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("sessions.json"));
        store.save(&sample_sessions()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        let session = &raw["1700000000000"];
        assert_eq!(session["id"], "1700000000000");
        assert_eq!(session["title"], "What is FAS?");
        assert_eq!(session["messages"][0]["role"], "user");
        assert_eq!(session["messages"][1]["sources"][0]["url"], "http://x");
        assert!(session["timestamp"].is_i64());
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemorySessionStore::new();
        assert!(store.load().unwrap().is_empty());

        store.save(&sample_sessions()).unwrap();
        store.save(&sample_sessions()).unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.snapshot().len(), 1);
    }
}
