//! # Stash Core
//!
//! Ports and domain types of the Stash cache layer.
//! This crate has no runtime or network dependencies; adapters live in `stash-infra`.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::{CacheError, StoreError};
