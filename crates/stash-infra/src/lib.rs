//! # Stash Infrastructure
//!
//! Concrete implementations of the ports defined in `stash-core`, plus the
//! JSON cache facade and the pattern delete engine built on top of them.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external dependencies, in-memory only
//! - `redis` - Redis store adapter

pub mod cache;
pub mod config;
pub mod logging;
pub mod store;

pub use cache::Cache;
pub use config::{CacheConfig, DEFAULT_SCAN_BATCH_SIZE, RedisConfig};
pub use logging::TracingLogger;
pub use store::InMemoryStore;

#[cfg(feature = "redis")]
pub use store::RedisStore;
