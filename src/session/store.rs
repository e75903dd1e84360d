//! Persisted mirror of the conversation.
//!
//! The store is rewritten on every message-sequence change so an
//! in-session reload keeps the conversation, but a fresh launch always
//! starts blank: opening the store discards whatever the previous
//! process left behind.

use crate::messages::Message;
use crate::{ReverieError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Key under which the conversation is persisted.
pub const CONVERSATION_KEY: &str = "conversation";

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Open the store at `path`, discarding any prior contents and
    /// persisting the empty sequence.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let store = Self { path };
        store.clear()?;
        info!("Session store opened at {:?}", store.path);
        Ok(store)
    }

    /// Default location under the platform data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reverie")
            .join(format!("{CONVERSATION_KEY}.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the full message sequence, replacing the previous snapshot.
    pub fn save(&self, messages: &[Message]) -> Result<()> {
        let json = serde_json::to_string(messages)
            .map_err(|e| ReverieError::Storage(format!("Failed to serialize conversation: {e}")))?;
        fs::write(&self.path, json)?;
        debug!("Persisted {} message(s)", messages.len());
        Ok(())
    }

    /// Read back the persisted sequence. A missing file reads as empty.
    pub fn load(&self) -> Result<Vec<Message>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&self.path)?;
        serde_json::from_str(&json)
            .map_err(|e| ReverieError::Storage(format!("Failed to parse conversation: {e}")))
    }

    /// Re-persist the empty sequence.
    pub fn clear(&self) -> Result<()> {
        self.save(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::open(dir.path().join("conversation.json")).unwrap()
    }

    #[test]
    fn test_open_discards_previous_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversation.json");

        let store = SessionStore::open(&path).unwrap();
        store.save(&[Message::user("from a previous life")]).unwrap();

        // A fresh open starts blank even though the file had content.
        let reopened = SessionStore::open(&path).unwrap();
        assert!(reopened.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let messages = vec![
            Message::user("I was falling"),
            Message::assistant("Falling can reflect a loss of control.", Some("a1".into())),
        ];
        store.save(&messages).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "I was falling");
        assert_eq!(loaded[1].id, "a1");
    }

    #[test]
    fn test_clear_persists_empty_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save(&[Message::user("soon gone")]).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
