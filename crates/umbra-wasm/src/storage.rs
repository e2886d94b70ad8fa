//! `localStorage` as a [`KeyValueStore`].

use umbra::storage::{KeyValueStore, StorageError};
use wasm_bindgen::JsValue;
use web_sys::{Storage, Window};

/// The page's `localStorage`, if the browser grants one.
///
/// Private browsing modes and sandboxed frames may refuse access; every
/// operation then fails with [`StorageError::Unavailable`].
#[derive(Debug, Clone)]
pub struct LocalStore {
    storage: Option<Storage>,
}

impl LocalStore {
    pub fn new(window: &Window) -> Self {
        Self {
            storage: window.local_storage().ok().flatten(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.storage.is_some()
    }

    fn storage(&self) -> Result<&Storage, StorageError> {
        self.storage
            .as_ref()
            .ok_or_else(|| StorageError::Unavailable("localStorage is not available".into()))
    }
}

fn js_error(err: &JsValue) -> StorageError {
    StorageError::Unavailable(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?.get_item(key).map_err(|e| js_error(&e))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?.set_item(key, value).map_err(|e| js_error(&e))
    }
}
