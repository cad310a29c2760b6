//! Durable storage seam for the session snapshot. The browser backend writes
//! through `window.localStorage`; the in-memory backend backs native builds
//! and tests, and doubles as the degraded mode when local storage is
//! unavailable for the page lifetime.

use crate::app_lib::AppError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Key/value storage for the persisted session snapshot. Implementations must
/// not panic on unavailable storage; callers treat errors as best-effort.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, AppError>;
    fn write(&self, key: &str, value: &str) -> Result<(), AppError>;
    fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// Process-local storage used on native targets and in tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::Storage("Storage lock poisoned.".to_string()))
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// `window.localStorage` backend. Stateless; the handle is resolved on every
/// call because storage access can be revoked at runtime.
#[cfg(target_arch = "wasm32")]
#[derive(Default)]
pub struct LocalStorage;

#[cfg(target_arch = "wasm32")]
impl LocalStorage {
    fn raw() -> Result<web_sys::Storage, AppError> {
        web_sys::window()
            .and_then(|window| window.local_storage().ok().flatten())
            .ok_or_else(|| AppError::Storage("Local storage is unavailable.".to_string()))
    }
}

#[cfg(target_arch = "wasm32")]
impl StorageBackend for LocalStorage {
    fn read(&self, key: &str) -> Result<Option<String>, AppError> {
        Self::raw()?
            .get_item(key)
            .map_err(|_| AppError::Storage("Failed to read local storage.".to_string()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), AppError> {
        Self::raw()?
            .set_item(key, value)
            .map_err(|_| AppError::Storage("Failed to write local storage.".to_string()))
    }

    fn remove(&self, key: &str) -> Result<(), AppError> {
        Self::raw()?
            .remove_item(key)
            .map_err(|_| AppError::Storage("Failed to clear local storage.".to_string()))
    }
}

/// Storage backend for the current target: local storage in the browser, an
/// in-memory map elsewhere.
#[cfg(target_arch = "wasm32")]
pub fn browser_storage() -> Arc<dyn StorageBackend> {
    Arc::new(LocalStorage)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn browser_storage() -> Arc<dyn StorageBackend> {
    Arc::new(MemoryStorage::new())
}
