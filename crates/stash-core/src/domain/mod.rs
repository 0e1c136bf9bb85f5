//! Domain types shared by every store adapter.

mod pattern;

pub use pattern::GlobPattern;
