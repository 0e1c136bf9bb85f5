//! In-memory store implementation - used as fallback when Redis is unavailable.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use tokio::sync::RwLock;
use tokio::time::Instant;

use stash_core::StoreError;
use stash_core::domain::GlobPattern;
use stash_core::ports::{KeyBatchStream, KeyStore};

struct StoreEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoreEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }
}

type Entries = Arc<RwLock<BTreeMap<String, StoreEntry>>>;

/// In-memory store using an ordered map behind an async RwLock.
///
/// Keys are kept sorted so a scan can resume after the last key it returned,
/// the same way a Redis cursor resumes. Expired entries are dropped lazily.
/// Note: Data is lost on process restart.
pub struct InMemoryStore {
    entries: Entries,
    connected: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Number of live (unexpired) keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_connected()?;

        let entries = self.entries.read().await;
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };

        if entry.is_expired(Instant::now()) {
            drop(entries);
            let mut entries = self.entries.write().await;
            // re-check: the key may have been rewritten while unlocked
            if entries
                .get(key)
                .is_some_and(|e| e.is_expired(Instant::now()))
            {
                entries.remove(key);
            }
            return Ok(None);
        }

        Ok(Some(entry.value.clone()))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.ensure_connected()?;

        let expires_at = ttl.map(|d| Instant::now() + d);
        self.entries
            .write()
            .await
            .insert(key.to_string(), StoreEntry { value, expires_at });

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.ensure_connected()?;

        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|e| !e.is_expired(Instant::now())))
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.ensure_connected()?;
        if keys.is_empty() {
            return Ok(0);
        }

        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let deleted = keys
            .iter()
            .filter_map(|key| entries.remove(key))
            .filter(|entry| !entry.is_expired(now))
            .count();

        Ok(deleted as u64)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.ensure_connected()?;
        self.entries.write().await.clear();
        Ok(())
    }

    fn scan(&self, pattern: &str, batch_size: usize) -> KeyBatchStream {
        let entries = self.entries.clone();
        let connected = self.connected.clone();
        let pattern = GlobPattern::new(pattern);
        let prefix = pattern.literal_prefix();
        let match_all = pattern.matches_all();
        let batch_size = batch_size.max(1);

        // `None` state means the previous step reached the end of the candidate range.
        let start = Some(Bound::Included(prefix.clone()));

        stream::unfold(start, move |lower| {
            let entries = entries.clone();
            let connected = connected.clone();
            let pattern = pattern.clone();
            let prefix = prefix.clone();

            async move {
                let lower = lower?;
                if !connected.load(Ordering::Acquire) {
                    return Some((Err(StoreError::Disconnected), None));
                }

                let now = Instant::now();
                let mut batch = Vec::with_capacity(batch_size);
                let mut more = false;
                {
                    let entries = entries.read().await;
                    for (key, entry) in entries.range((lower, Bound::<String>::Unbounded)) {
                        if !key.starts_with(&prefix) {
                            break;
                        }
                        if entry.is_expired(now) || !(match_all || pattern.matches(key)) {
                            continue;
                        }
                        batch.push(key.clone());
                        if batch.len() == batch_size {
                            more = true;
                            break;
                        }
                    }
                }

                if batch.is_empty() {
                    return None;
                }
                let next = if more {
                    batch.last().cloned().map(Bound::Excluded)
                } else {
                    None
                };
                Some((Ok(batch), next))
            }
        })
        .boxed()
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        if self.connected.swap(false, Ordering::AcqRel) {
            tracing::debug!("In-memory store disconnected");
        }
        Ok(())
    }
}
