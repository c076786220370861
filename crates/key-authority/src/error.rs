//! Error types for authority operations

/// Errors from key authority operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no available API keys")]
    NoAvailableKey,

    #[error("key store error: {0}")]
    Store(#[from] keystore::StoreError),
}

/// Result alias for authority operations.
pub type Result<T> = std::result::Result<T, Error>;
