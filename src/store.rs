use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};

/// Key-value backend holding feature records and the feature index.
/// Implementations must be thread-safe.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn del(&self, key: &str) -> Result<()>;
}

/// Backends that can replace a value only if it still holds what the caller
/// last read.
pub trait AtomicStore: Store {
    /// Writes `new` under `key` if the current value equals `expected`
    /// (`None` meaning absent). Returns whether the write happened.
    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn del(&self, key: &str) -> Result<()> {
        (**self).del(key)
    }
}

impl<S: AtomicStore + ?Sized> AtomicStore for Arc<S> {
    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool> {
        (**self).compare_and_swap(key, expected, new)
    }
}

impl<S: Store + ?Sized> Store for &S {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn del(&self, key: &str) -> Result<()> {
        (**self).del(key)
    }
}

/// In-memory storage backed by a `RwLock<HashMap>`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, String>>> {
        self.data
            .read()
            .map_err(|_| Error::store("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, String>>> {
        self.data
            .write()
            .map_err(|_| Error::store("memory store lock poisoned"))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Sorted list of keys currently stored.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.read()?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }
}

impl AtomicStore for MemoryStore {
    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool> {
        let mut data = self.write()?;
        if data.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        data.insert(key.to_string(), new.to_string());
        Ok(true)
    }
}
