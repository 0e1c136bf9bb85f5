//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod logger;
mod store;

pub use logger::{CacheLogger, LogRecord, NoopLogger};
pub use store::{KeyBatch, KeyBatchStream, KeyStore};
