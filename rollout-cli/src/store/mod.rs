pub mod sled_store;

use std::sync::Arc;

use rollout_lib::{AtomicStore, MemoryStore};

use crate::config::{StorageBackend, StorageConfig};

pub use sled_store::SledStore;

/// Opens the backend selected in the configuration.
pub fn open(config: &StorageConfig) -> Result<Arc<dyn AtomicStore>, String> {
    match config.backend {
        StorageBackend::Sled => Ok(Arc::new(SledStore::open(&config.data_dir)?)),
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
