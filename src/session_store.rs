//! Session-scoped key/value stores for unsaved drafts.
//!
//! Drafts survive navigating away from a device and back, but not a full
//! session reset. [`MemorySessionStore`] lives as long as the process;
//! [`DirSessionStore`] keeps one JSON file per key in a session directory that
//! the host removes when the session ends.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use gas_core::{DeviceId, PersistenceError};
use parking_lot::Mutex;

/// Key under which a device's drafts are stored.
pub fn drafts_key(device: &DeviceId) -> String {
    format!("drafts:{device}")
}

/// Storage for serialized draft maps.
pub trait SessionStore: Send + Sync {
    /// Stored value for `key`, or `None` if nothing was stored.
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// Process-lifetime store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct DirSessionStore {
    dir: PathBuf,
}

impl DirSessionStore {
    /// Store files under `dir`, created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File names are the hex-encoded key, so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(key)))
    }
}

impl SessionStore for DirSessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dir_store_round_trips_and_reports_missing_keys() {
        let dir = tempdir().unwrap();
        let store = DirSessionStore::new(dir.path().join("session"));
        let key = drafts_key(&DeviceId::new("gas/01"));

        assert!(store.load(&key).unwrap().is_none());
        store.save(&key, "{}").unwrap();
        assert_eq!(store.load(&key).unwrap().as_deref(), Some("{}"));
        assert!(dir
            .path()
            .join("session")
            .join(format!("{}.json", hex::encode("drafts:gas/01")))
            .exists());
    }

    #[test]
    fn dir_store_keeps_similar_keys_apart() {
        let dir = tempdir().unwrap();
        let store = DirSessionStore::new(dir.path());
        let slashed = drafts_key(&DeviceId::new("a/b"));
        let underscored = drafts_key(&DeviceId::new("a_b"));

        store.save(&slashed, "slashed").unwrap();
        store.save(&underscored, "underscored").unwrap();
        assert_eq!(store.load(&slashed).unwrap().as_deref(), Some("slashed"));
        assert_eq!(store.load(&underscored).unwrap().as_deref(), Some("underscored"));
    }

    #[test]
    fn memory_store_overwrites() {
        let store = MemorySessionStore::new();
        store.save("drafts:a", "1").unwrap();
        store.save("drafts:a", "2").unwrap();
        assert_eq!(store.load("drafts:a").unwrap().as_deref(), Some("2"));
    }
}
