//! Store and cache error types.

use thiserror::Error;

/// Errors reported by a [`KeyStore`](crate::ports::KeyStore) backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Store is disconnected")]
    Disconnected,
}

/// Errors surfaced to callers of the cache facade.
///
/// Most cache operations fail soft and never return these. Only construction
/// and pattern deletion report failures to the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Scan for pattern '{pattern}' failed: {source}")]
    Scan {
        pattern: String,
        #[source]
        source: StoreError,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// Whether the keyspace enumeration itself failed.
    pub fn is_scan_failure(&self) -> bool {
        matches!(self, CacheError::Scan { .. })
    }
}
