//! Generated-asset storage.

/// Produce-if-absent cache with single-flight generation.
pub mod cache;
/// Key to file-name mapping.
pub mod key;

pub use cache::{AssetCache, CacheStats};
pub use key::{AssetKey, Namespace};
