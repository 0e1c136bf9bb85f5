//! JSON cache facade over a [`KeyStore`].
//!
//! Every operation except [`Cache::del_pattern`] fails soft: errors are logged
//! through the injected [`CacheLogger`] and the caller sees a miss or a no-op.

mod pattern_delete;


use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use stash_core::CacheError;
use stash_core::ports::{CacheLogger, KeyStore, LogRecord};

use crate::config::{CacheConfig, DEFAULT_SCAN_BATCH_SIZE};
use crate::logging::TracingLogger;
use crate::store::InMemoryStore;

#[cfg(feature = "redis")]
use crate::store::RedisStore;

pub use pattern_delete::{DeletionTally, delete_matching};

/// Best-effort cache storing JSON-encoded values.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn KeyStore>,
    logger: Arc<dyn CacheLogger>,
    batch_size: usize,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.store.name())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Cache {
    /// Wrap a store, logging through `tracing` with the default batch size.
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            logger: Arc::new(TracingLogger),
            batch_size: DEFAULT_SCAN_BATCH_SIZE,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    pub fn with_logger(mut self, logger: Arc<dyn CacheLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Keys per scan step and per batch delete. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Connect to the configured store.
    ///
    /// An unreachable Redis is a hard failure unless `fallback_to_memory` is set.
    pub async fn connect(config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;

        #[cfg(feature = "redis")]
        let store: Arc<dyn KeyStore> = match RedisStore::new(&config.redis).await {
            Ok(store) => Arc::new(store),
            Err(e) if config.fallback_to_memory => {
                tracing::warn!(
                    endpoint = %config.redis.endpoint(),
                    error = %e,
                    "Redis unavailable - using in-memory store"
                );
                Arc::new(InMemoryStore::new())
            }
            Err(e) => return Err(CacheError::Connection(e.to_string())),
        };

        #[cfg(not(feature = "redis"))]
        let store: Arc<dyn KeyStore> = {
            tracing::info!("Running without redis feature - using in-memory store");
            Arc::new(InMemoryStore::new())
        };

        Ok(Self::new(store).with_batch_size(config.scan_batch_size))
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, CacheError> {
        Self::connect(CacheConfig::from_env()).await
    }

    /// Fetch and decode a value. Missing keys, store errors and undecodable
    /// bytes all read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                self.logger
                    .warn(&LogRecord::new("Cache GET failed").key(key).error(&e));
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                self.logger.warn(
                    &LogRecord::new("Cached value could not be decoded")
                        .key(key)
                        .error(&e),
                );
                None
            }
        }
    }

    /// Encode and store a value. `None` or a zero TTL stores without expiration.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.logger.error(
                    &LogRecord::new("Cache value could not be encoded")
                        .key(key)
                        .error(&e),
                );
                return;
            }
        };

        let ttl = ttl.filter(|d| !d.is_zero());
        if let Err(e) = self.store.set(key, bytes, ttl).await {
            self.logger
                .error(&LogRecord::new("Cache SET failed").key(key).error(&e));
        }
    }

    pub async fn del(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            self.logger
                .error(&LogRecord::new("Cache DEL failed").key(key).error(&e));
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        match self.store.exists(key).await {
            Ok(found) => found,
            Err(e) => {
                self.logger
                    .warn(&LogRecord::new("Cache EXISTS failed").key(key).error(&e));
                false
            }
        }
    }

    /// Delete every key matching the glob `pattern` and return how many the
    /// store actually removed.
    ///
    /// Resolves only after every batch delete has finished. Failed batches
    /// count as zero; a failed scan is returned as [`CacheError::Scan`].
    pub async fn del_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        self.del_pattern_with_batch_size(pattern, self.batch_size).await
    }

    /// [`Cache::del_pattern`] with an explicit batch size for this call.
    pub async fn del_pattern_with_batch_size(
        &self,
        pattern: &str,
        batch_size: usize,
    ) -> Result<u64, CacheError> {
        let tally =
            delete_matching(&self.store, self.logger.as_ref(), pattern, batch_size.max(1)).await?;

        self.logger.info(
            &LogRecord::new("Deleted keys matching pattern")
                .pattern(pattern)
                .count(tally.deleted),
        );
        Ok(tally.deleted)
    }

    /// Remove every key in the store. Destructive and store-wide.
    pub async fn clear(&self) {
        match self.store.flush().await {
            Ok(()) => self.logger.warn(&LogRecord::new("Cache cleared")),
            Err(e) => self
                .logger
                .error(&LogRecord::new("Cache clear failed").error(&e)),
        }
    }

    /// Release the store connection. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        match self.store.disconnect().await {
            Ok(()) => self.logger.debug(&LogRecord::new("Cache disconnected")),
            Err(e) => self
                .logger
                .warn(&LogRecord::new("Cache disconnect failed").error(&e)),
        }
    }
}
