use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache key `{key}` not found")]
    NotFound { key: String },
    #[error("cache value for `{key}` cannot be adjusted: {reason}")]
    TypeMismatch { key: String, reason: &'static str },
    #[error("failed to encode or decode cached value: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("failed to render cached template: {0}")]
    Render(#[from] askama::Error),
    #[error("cache store failure: {message}")]
    Store { message: String },
    #[error("failed to spawn cache worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

impl CacheError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn type_mismatch(key: impl Into<String>, reason: &'static str) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            reason,
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Returns true for the miss sentinel, which callers treat as control flow.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
