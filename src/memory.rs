//! Session memory and its on-disk snapshot
//!
//! The whole memory is one JSON record with three string lists. It is read
//! once at startup and overwritten in full on save.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Everything the assistant remembers between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Recognized utterances, in the order they were heard
    #[serde(default)]
    pub conversations: Vec<String>,

    /// Items the user asked to remember
    #[serde(default)]
    pub tasks: Vec<String>,

    /// Persisted for format compatibility; no rule writes to it
    #[serde(default)]
    pub preferences: Vec<String>,
}

impl MemorySnapshot {
    /// Append a recognized utterance to the conversation history
    pub fn record_conversation(&mut self, text: impl Into<String>) {
        self.conversations.push(text.into());
    }

    /// Append a remembered task
    pub fn remember_task(&mut self, task: impl Into<String>) {
        self.tasks.push(task.into());
    }

    /// The last `limit` tasks, oldest first
    #[must_use]
    pub fn recent_tasks(&self, limit: usize) -> &[String] {
        let start = self.tasks.len().saturating_sub(limit);
        &self.tasks[start..]
    }

    /// Reset to the empty snapshot
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// JSON file holding the memory snapshot
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
}

impl MemoryStore {
    /// Create a store backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the memory file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot
    ///
    /// A missing, unreadable or corrupt file yields an empty snapshot.
    #[must_use]
    pub fn load(&self) -> MemorySnapshot {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no memory file, starting empty");
            return MemorySnapshot::default();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<MemorySnapshot>(&content) {
                Ok(snapshot) => {
                    tracing::info!(
                        path = %self.path.display(),
                        conversations = snapshot.conversations.len(),
                        tasks = snapshot.tasks.len(),
                        "loaded memory"
                    );
                    snapshot
                }
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "memory file is corrupt, starting empty"
                    );
                    MemorySnapshot::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to read memory file, starting empty"
                );
                MemorySnapshot::default()
            }
        }
    }

    /// Save the snapshot, logging instead of failing
    ///
    /// Returns whether the write succeeded.
    pub fn save(&self, snapshot: &MemorySnapshot) -> bool {
        match self.try_save(snapshot) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "memory saved");
                true
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to save memory");
                false
            }
        }
    }

    /// Save the snapshot, replacing the previous file in one rename
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn try_save(&self, snapshot: &MemorySnapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_vec(snapshot)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Memory(format!("failed to replace memory file: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemorySnapshot {
        MemorySnapshot {
            conversations: vec!["Hello".to_string(), "what time is it".to_string()],
            tasks: vec!["buy milk".to_string(), "call mom".to_string()],
            preferences: vec!["tea, not coffee".to_string()],
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("assistant_memory.json"));

        assert_eq!(store.load(), MemorySnapshot::default());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant_memory.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(MemoryStore::new(&path).load(), MemorySnapshot::default());
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant_memory.json");
        std::fs::write(&path, r#"{"tasks":["water plants"]}"#).unwrap();

        let snapshot = MemoryStore::new(&path).load();
        assert_eq!(snapshot.tasks, vec!["water plants"]);
        assert!(snapshot.conversations.is_empty());
        assert!(snapshot.preferences.is_empty());
    }

    #[test]
    fn test_save_then_load_twice_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("assistant_memory.json"));
        let original = sample();

        assert!(store.save(&original));
        let first = store.load();
        assert!(store.save(&first));
        let second = store.load();

        assert_eq!(first, original);
        assert_eq!(second, original);
    }

    #[test]
    fn test_saved_file_has_all_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assistant_memory.json");
        MemoryStore::new(&path).save(&MemorySnapshot::default());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for field in ["conversations", "tasks", "preferences"] {
            assert!(raw[field].is_array(), "missing {field}");
        }
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new(dir.path().join("nested").join("memory.json"));

        assert!(store.save(&sample()));
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn test_save_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        // The target path is an existing directory, so the rename fails
        let store = MemoryStore::new(dir.path());

        assert!(!store.save(&sample()));
    }

    #[test]
    fn test_recent_tasks_keeps_order() {
        let mut snapshot = MemorySnapshot::default();
        for task in ["a", "b", "c", "d"] {
            snapshot.remember_task(task);
        }

        assert_eq!(snapshot.recent_tasks(3), ["b", "c", "d"]);
        assert_eq!(snapshot.recent_tasks(10).len(), 4);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut snapshot = sample();
        snapshot.clear();
        assert_eq!(snapshot, MemorySnapshot::default());
    }
}
