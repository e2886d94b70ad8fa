//! Durable key-value storage for the user's last theme choice.
//!
//! The engine only ever stores one small string. Failures are reported as
//! [`StorageError`] by the stores but never surface past the engine, which
//! logs them and carries on with in-memory state.

use std::collections::HashMap;
#[cfg(feature = "native")]
use std::fs;
#[cfg(feature = "native")]
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error reading or writing persisted state.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A string-to-string store.
pub trait KeyValueStore {
    /// Read a value.
    ///
    /// # Errors
    /// Returns `StorageError` if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value.
    ///
    /// # Errors
    /// Returns `StorageError` if the backing store cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory store; lost when dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Borrow a stored value.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A store that remembers nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullStore;

impl KeyValueStore for NullStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Store backed by a JSON object on disk.
///
/// The whole file is rewritten on every `set`.
///
/// # Availability
/// Only available with the `native` feature (not on WASM).
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

#[cfg(feature = "native")]
impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(feature = "native")]
impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        let content = serde_json::to_string_pretty(&values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Encode the inverted flag the way it is persisted.
pub fn encode_flag(enabled: bool) -> &'static str {
    if enabled { "1" } else { "0" }
}

/// Decode a persisted flag. Unrecognized values mean "no stored choice".
pub fn decode_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_codec() {
        assert_eq!(decode_flag(encode_flag(true)), Some(true));
        assert_eq!(decode_flag(encode_flag(false)), Some(false));
        assert_eq!(decode_flag("TRUE"), Some(true));
        assert_eq!(decode_flag(" false "), Some(false));
        assert_eq!(decode_flag("yes"), None);
        assert_eq!(decode_flag(""), None);
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new().with("a", "1");
        assert_eq!(store.get("a").expect("get"), Some("1".to_string()));
        store.set("a", "0").expect("set");
        assert_eq!(store.value("a"), Some("0"));
        assert_eq!(store.get("missing").expect("get"), None);
    }

    #[test]
    fn test_null_store_forgets() {
        let mut store = NullStore;
        store.set("k", "v").expect("set");
        assert_eq!(store.get("k").expect("get"), None);
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");

        let mut store = FileStore::new(&path);
        assert_eq!(store.get("theme").expect("get"), None);
        store.set("theme", "1").expect("set");

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("theme").expect("get"), Some("1".to_string()));
    }

    #[cfg(feature = "native")]
    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, "not json").expect("write");

        let store = FileStore::new(&path);
        assert!(matches!(store.get("theme"), Err(StorageError::Json(_))));
    }
}
