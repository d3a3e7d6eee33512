//! Key-value storage backends.
//!
//! Every operation returns a [`Thenable`], so a backend is free to answer
//! synchronously or hand back a future. Two backends ship with the crate:
//! - `MemoryStorage`: in-process map, synchronous
//! - `FileStorage`: one file per key under a directory, synchronous

use crate::error::{PersistError, Result};
use crate::thenable::Thenable;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Trait for storage backends used by the persist middleware.
pub trait StateStorage: Send + Sync {
    /// Read the raw value stored under `name`.
    fn get_item(&self, name: &str) -> Thenable<Option<String>>;

    /// Store `value` under `name`.
    fn set_item(&self, name: &str, value: String) -> Thenable<()>;

    /// Remove the value stored under `name`. Removing a missing key is fine.
    fn remove_item(&self, name: &str) -> Thenable<()>;
}

/// In-memory storage backed by a `HashMap`.
///
/// Thread-safe and synchronous: every operation settles before it returns.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide storage used when no backend is configured.
    pub fn global() -> Arc<Self> {
        static STORAGE: OnceLock<Arc<MemoryStorage>> = OnceLock::new();
        Arc::clone(STORAGE.get_or_init(|| Arc::new(MemoryStorage::new())))
    }

    /// Read a value directly.
    pub fn get(&self, name: &str) -> Option<String> {
        self.items.read().get(name).cloned()
    }

    /// Write a value directly.
    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.items.write().insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }
}

impl StateStorage for MemoryStorage {
    fn get_item(&self, name: &str) -> Thenable<Option<String>> {
        Thenable::resolved(self.get(name))
    }

    fn set_item(&self, name: &str, value: String) -> Thenable<()> {
        self.set(name, value);
        Thenable::resolved(())
    }

    fn remove_item(&self, name: &str) -> Thenable<()> {
        self.items.write().remove(name);
        Thenable::resolved(())
    }
}

/// Directory-backed storage: each key lives in its own file.
///
/// Writes go to a temporary file that is then renamed over the target, so
/// a reader never observes a half-written record.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `name`.
    ///
    /// Bytes outside `[A-Za-z0-9_-]` are hex-escaped so any key maps
    /// to a single file name inside the directory.
    pub fn path_for(&self, name: &str) -> PathBuf {
        let mut file = String::with_capacity(name.len() + 5);
        for byte in name.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' => file.push(byte as char),
                _ => file.push_str(&format!("%{byte:02X}")),
            }
        }
        file.push_str(".json");
        self.dir.join(file)
    }

    fn read(&self, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(name)) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, name: &str, value: &str) -> Result<()> {
        let target = self.path_for(name);
        let temp = target.with_extension("json.tmp");

        let mut file = fs::File::create(&temp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp, &target).map_err(|err| {
            let _ = fs::remove_file(&temp);
            PersistError::from(err)
        })
    }

    fn remove(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path_for(name)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

impl StateStorage for FileStorage {
    fn get_item(&self, name: &str) -> Thenable<Option<String>> {
        Thenable::from_result(self.read(name))
    }

    fn set_item(&self, name: &str, value: String) -> Thenable<()> {
        Thenable::from_result(self.write(name, &value))
    }

    fn remove_item(&self, name: &str) -> Thenable<()> {
        Thenable::from_result(self.remove(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled<T: Send + 'static>(t: Thenable<T>) -> Result<T> {
        t.try_ready().unwrap_or_else(|_| panic!("storage should be synchronous"))
    }

    #[test]
    fn memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(settled(storage.get_item("k")), Ok(None));

        settled(storage.set_item("k", "v".to_string())).unwrap();
        assert_eq!(settled(storage.get_item("k")), Ok(Some("v".to_string())));
        assert_eq!(storage.len(), 1);

        settled(storage.remove_item("k")).unwrap();
        settled(storage.remove_item("k")).unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn global_storage_is_shared() {
        let a = MemoryStorage::global();
        let b = MemoryStorage::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state")).unwrap();

        assert_eq!(settled(storage.get_item("app")), Ok(None));
        settled(storage.set_item("app", r#"{"state":1}"#.to_string())).unwrap();
        settled(storage.set_item("app", r#"{"state":2}"#.to_string())).unwrap();
        assert_eq!(
            settled(storage.get_item("app")),
            Ok(Some(r#"{"state":2}"#.to_string()))
        );

        settled(storage.remove_item("app")).unwrap();
        assert_eq!(settled(storage.get_item("app")), Ok(None));
        settled(storage.remove_item("app")).unwrap();
    }

    #[test]
    fn file_names_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        let path = storage.path_for("../user/settings");
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("%2E%2E%2Fuser%2Fsettings.json")
        );
        assert!(storage.path_for("app.v1").ends_with("app%2Ev1.json"));
    }
}
