use rollout_lib::{AtomicStore, Error, Result, Store};

/// Persistent rollout storage backed by sled.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    /// Open a sled database at the given directory path.
    pub fn open(data_dir: &str) -> std::result::Result<Self, String> {
        let db = sled::open(data_dir).map_err(|e| format!("failed to open sled db: {}", e))?;
        Ok(Self::new(db))
    }

    fn decode(key: &str, value: sled::IVec) -> Result<String> {
        String::from_utf8(value.to_vec()).map_err(|_| Error::Encoding {
            key: key.to_string(),
        })
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| Error::store(format!("failed to flush: {}", e)))?;
        Ok(())
    }
}

impl Store for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .get(key)
            .map_err(|e| Error::store(format!("failed to read {}: {}", key, e)))?
            .map(|value| Self::decode(key, value))
            .transpose()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key, value.as_bytes())
            .map_err(|e| Error::store(format!("failed to store {}: {}", key, e)))?;
        self.flush()
    }

    fn del(&self, key: &str) -> Result<()> {
        self.db
            .remove(key)
            .map_err(|e| Error::store(format!("failed to delete {}: {}", key, e)))?;
        self.flush()
    }
}

impl AtomicStore for SledStore {
    fn compare_and_swap(&self, key: &str, expected: Option<&str>, new: &str) -> Result<bool> {
        let swapped = self
            .db
            .compare_and_swap(key, expected.map(str::as_bytes), Some(new.as_bytes()))
            .map_err(|e| Error::store(format!("failed to swap {}: {}", key, e)))?;
        if swapped.is_err() {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }
}
