//! Redis store implementation built on a shared connection manager.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use futures::{StreamExt, TryStreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

use stash_core::StoreError;
use stash_core::ports::{KeyBatch, KeyBatchStream, KeyStore};

use crate::config::RedisConfig;

/// Redis-backed store.
///
/// Uses connection manager for automatic reconnection. Clones of the manager
/// share one multiplexed connection, so concurrent commands need no locking.
pub struct RedisStore {
    conn: RwLock<Option<ConnectionManager>>,
    endpoint: String,
}

impl RedisStore {
    pub async fn new(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = open_client(config)?;

        // Use timeout to prevent hanging if Redis is unreachable
        let conn_manager_fut = ConnectionManager::new(client);
        let conn = tokio::time::timeout(config.connect_timeout, conn_manager_fut)
            .await
            .map_err(|_| StoreError::Connection("Connection timed out".to_string()))?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let endpoint = config.endpoint();
        tracing::info!(endpoint = %endpoint, "Connected to Redis store");

        Ok(Self {
            conn: RwLock::new(Some(conn)),
            endpoint,
        })
    }

    /// Create from environment configuration.
    pub async fn from_env() -> Result<Self, StoreError> {
        Self::new(&RedisConfig::from_env()).await
    }

    fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.conn
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::Disconnected)
    }
}

fn open_client(config: &RedisConfig) -> Result<Client, StoreError> {
    let client = match &config.url {
        Some(url) => Client::open(url.as_str()),
        None => Client::open(ConnectionInfo {
            addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
            redis: RedisConnectionInfo {
                db: config.db,
                username: config.username.clone(),
                password: config.password.clone(),
                ..Default::default()
            },
        }),
    };
    client.map_err(|e| StoreError::Connection(e.to_string()))
}

fn command_error(command: &str, e: redis::RedisError) -> StoreError {
    StoreError::Command(format!("{command} failed: {e}"))
}

/// Convert raw SCAN key names to strings.
///
/// Other clients can create keys that are not valid UTF-8. Those are skipped
/// and logged instead of failing the whole scan.
fn decode_keys(raw: Vec<Vec<u8>>) -> Vec<String> {
    raw.into_iter()
        .filter_map(|bytes| match String::from_utf8(bytes) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(
                    key = %String::from_utf8_lossy(e.as_bytes()),
                    error = %e,
                    "Skipping SCAN key that is not valid UTF-8"
                );
                None
            }
        })
        .collect()
}

/// Split one SCAN reply into batches of at most `batch_size` keys.
///
/// COUNT is only a hint to Redis, so a reply can exceed it. Keys repeated
/// inside a single reply are dropped.
fn into_batches(keys: Vec<String>, batch_size: usize) -> Vec<KeyBatch> {
    let mut seen = HashSet::with_capacity(keys.len());
    let unique: Vec<String> = keys.into_iter().filter(|k| seen.insert(k.clone())).collect();
    unique.chunks(batch_size).map(<[String]>::to_vec).collect()
}

#[async_trait]
impl KeyStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.connection()?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| command_error("GET", e))
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection()?;

        match ttl {
            Some(duration) if duration.subsec_nanos() == 0 => {
                conn.set_ex::<_, _, ()>(key, value, duration.as_secs())
                    .await
                    .map_err(|e| command_error("SET EX", e))?;
            }
            Some(duration) => {
                let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1);
                conn.pset_ex::<_, _, ()>(key, value, millis)
                    .await
                    .map_err(|e| command_error("SET PX", e))?;
            }
            None => {
                conn.set::<_, _, ()>(key, value)
                    .await
                    .map_err(|e| command_error("SET", e))?;
            }
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection()?;
        let removed: u64 = conn.del(key).await.map_err(|e| command_error("DEL", e))?;
        Ok(removed > 0)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection()?;
        conn.del::<_, u64>(keys)
            .await
            .map_err(|e| command_error("DEL", e))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection()?;
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| command_error("EXISTS", e))
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("FLUSHDB", e))?;
        Ok(())
    }

    fn scan(&self, pattern: &str, batch_size: usize) -> KeyBatchStream {
        let conn = match self.connection() {
            Ok(conn) => conn,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let pattern = pattern.to_string();
        let batch_size = batch_size.max(1);

        // state: the connection and the next cursor, `None` once Redis returns cursor 0
        stream::try_unfold((conn, Some(0u64)), move |(mut conn, cursor)| {
            let pattern = pattern.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok(None);
                };

                let (next, raw_keys): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(batch_size)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| command_error("SCAN", e))?;

                let next = (next != 0).then_some(next);
                Ok(Some((decode_keys(raw_keys), (conn, next))))
            }
        })
        .map_ok(move |keys| stream::iter(into_batches(keys, batch_size).into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        let previous = self
            .conn
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // Dropping the last manager clone closes the socket; in-flight clones finish first.
        if previous.is_some() {
            tracing::info!(endpoint = %self.endpoint, "Disconnected from Redis store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stash_core::ports::NoopLogger;

    use crate::cache::Cache;

    async fn get_test_store() -> Option<RedisStore> {
        let config = RedisConfig {
            url: Some(
                std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://localhost:6389".to_string()),
            ),
            connect_timeout: Duration::from_secs(1),
            ..RedisConfig::default()
        };

        RedisStore::new(&config).await.ok()
    }

    #[test]
    fn test_into_batches_splits_and_dedupes() {
        let keys: Vec<String> = ["a", "b", "a", "c", "d", "e"]
            .iter()
            .map(|k| k.to_string())
            .collect();

        let batches = into_batches(keys, 2);
        assert_eq!(
            batches,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), "d".to_string()],
                vec!["e".to_string()],
            ]
        );
        assert!(into_batches(Vec::new(), 10).is_empty());
    }

    #[test]
    fn test_decode_keys_skips_invalid_utf8() {
        let raw = vec![
            b"user:1".to_vec(),
            vec![b'u', b's', b'e', b'r', b':', 0xff, 0xfe],
            "user:\u{e9}".as_bytes().to_vec(),
        ];

        assert_eq!(
            decode_keys(raw),
            vec!["user:1".to_string(), "user:\u{e9}".to_string()]
        );
        assert!(decode_keys(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_redis_store_set_get() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => {
                tracing::warn!("Redis not available, skipping test");
                return;
            }
        };

        let key = "stash_test:store:set_get";
        store.set(key, b"value".to_vec(), None).await.unwrap();
        assert_eq!(store.get(key).await.unwrap(), Some(b"value".to_vec()));
        assert!(store.exists(key).await.unwrap());

        assert!(store.delete(key).await.unwrap());
        assert_eq!(store.get(key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_redis_store_scan_and_delete_many() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        for i in 0..30 {
            let key = format!("stash_test:scan:{i}");
            store.set(&key, b"1".to_vec(), None).await.unwrap();
        }

        let batches: Vec<KeyBatch> = store
            .scan("stash_test:scan:*", 7)
            .try_collect()
            .await
            .unwrap();
        assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 7));

        let mut deleted = 0;
        for batch in &batches {
            deleted += store.delete_many(batch).await.unwrap();
        }
        assert_eq!(deleted, 30);
    }

    #[tokio::test]
    async fn test_redis_store_disconnect() {
        let store = match get_test_store().await {
            Some(s) => s,
            None => return,
        };

        store.disconnect().await.unwrap();
        store.disconnect().await.unwrap();
        assert!(matches!(
            store.get("stash_test:any").await,
            Err(StoreError::Disconnected)
        ));
    }

    async fn get_test_cache() -> Option<(Arc<RedisStore>, Cache)> {
        let store = Arc::new(get_test_store().await?);
        let cache = Cache::new(store.clone())
            .with_logger(Arc::new(NoopLogger))
            .with_batch_size(100);
        Some((store, cache))
    }

    #[tokio::test]
    async fn test_redis_del_pattern_spans_batches() {
        let (_store, cache) = match get_test_cache().await {
            Some(c) => c,
            None => return,
        };

        // leftovers from an interrupted run
        cache.del_pattern("stash_test:batch:*").await.unwrap();
        cache.del_pattern("stash_test:keep:*").await.unwrap();

        for i in 0..250u32 {
            cache.set(&format!("stash_test:batch:{i}"), &i, None).await;
        }
        cache.set("stash_test:keep:1", &1u32, None).await;

        assert_eq!(cache.del_pattern("stash_test:batch:*").await.unwrap(), 250);
        assert_eq!(cache.del_pattern("stash_test:batch:*").await.unwrap(), 0);
        assert_eq!(cache.get::<u32>("stash_test:batch:7").await, None);
        assert_eq!(cache.get::<u32>("stash_test:keep:1").await, Some(1));

        cache.del("stash_test:keep:1").await;
    }

    #[tokio::test]
    async fn test_redis_del_pattern_leaves_other_families() {
        let (_store, cache) = match get_test_cache().await {
            Some(c) => c,
            None => return,
        };

        cache.set("stash_test:user:1", &serde_json::json!({"id": 1}), None).await;
        cache.set("stash_test:user:2", &serde_json::json!({"id": 2}), None).await;
        cache.set("stash_test:post:1", &serde_json::json!({"id": 1}), None).await;

        assert_eq!(cache.del_pattern("stash_test:user:*").await.unwrap(), 2);
        assert_eq!(cache.get::<serde_json::Value>("stash_test:user:1").await, None);
        assert_eq!(cache.get::<serde_json::Value>("stash_test:user:2").await, None);
        assert_eq!(
            cache.get::<serde_json::Value>("stash_test:post:1").await,
            Some(serde_json::json!({"id": 1}))
        );

        cache.del("stash_test:post:1").await;
    }

    #[tokio::test]
    async fn test_redis_ttl_whole_seconds() {
        let (_store, cache) = match get_test_cache().await {
            Some(c) => c,
            None => return,
        };

        let key = "stash_test:ttl:seconds";
        cache.set(key, "v", Some(Duration::from_secs(1))).await;
        assert_eq!(cache.get::<String>(key).await, Some("v".to_string()));

        // Wait for expiration
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(cache.get::<String>(key).await, None);
    }

    #[tokio::test]
    async fn test_redis_ttl_sub_second() {
        let (store, cache) = match get_test_cache().await {
            Some(c) => c,
            None => return,
        };

        let key = "stash_test:ttl:millis";
        cache.set(key, "v", Some(Duration::from_millis(300))).await;
        assert!(store.exists(key).await.unwrap());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!store.exists(key).await.unwrap());
    }
}
