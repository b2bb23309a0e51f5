use thiserror::Error;

/// Errors surfaced by the rollout engine.
///
/// Decoding a stored feature never fails; only the storage layer and the
/// optional compare-and-swap update produce errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("storage backend error: {0}")]
    Store(String),

    #[error("stored value for key '{key}' is not valid utf-8")]
    Encoding { key: String },

    #[error("feature '{name}' changed concurrently, gave up after {attempts} attempts")]
    Conflict { name: String, attempts: u32 },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
