use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::StoreError;

/// A group of keys produced by one step of a keyspace scan.
pub type KeyBatch = Vec<String>;

/// Lazy, pull-based sequence of key batches.
///
/// Every item holds at least one and at most `batch_size` keys. After an
/// `Err` item the stream yields nothing more.
pub type KeyBatchStream = BoxStream<'static, Result<KeyBatch, StoreError>>;

/// Raw key-value store primitives - abstraction over store backends (Redis, in-memory).
///
/// Values are opaque bytes at this layer; encoding belongs to the cache facade.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Short backend label used in log output.
    fn name(&self) -> &'static str;

    /// Fetch the raw bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store `value` under `key`, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>)
    -> Result<(), StoreError>;

    /// Remove one key. Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove a batch of keys and return how many were actually removed.
    ///
    /// The count can be lower than `keys.len()` when some keys expired or
    /// were deleted by another client after they were scanned.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Check if a live key exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove every key in the store's selected keyspace.
    async fn flush(&self) -> Result<(), StoreError>;

    /// Incrementally enumerate keys matching a glob `pattern`.
    ///
    /// The first batch must be available without enumerating the whole
    /// keyspace. Keys mutated during the scan may be skipped or revisited,
    /// depending on the backend.
    fn scan(&self, pattern: &str, batch_size: usize) -> KeyBatchStream;

    /// Release the connection. Calling this more than once is a no-op.
    async fn disconnect(&self) -> Result<(), StoreError>;
}
