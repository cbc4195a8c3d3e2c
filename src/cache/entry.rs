//! Cache key and entry types shared by the session and persistent caches.

use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifies a cached result: the file it was computed from plus a
/// canonicalized description of the operation and its options.
///
/// The `options` string should be a stable, sorted encoding of whatever
/// parameters affect the result (e.g. `"depth=2,include_body=false"`), so
/// that equivalent calls produce the same key regardless of caller-side
/// field ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// The file this cached value was derived from.
    pub file: PathBuf,
    /// The operation name (e.g. `"symbols_overview"`, `"find_symbol"`).
    pub operation: String,
    /// Canonicalized options string.
    pub options: String,
}

impl CacheKey {
    /// Builds a cache key.
    #[must_use]
    pub fn new(file: impl Into<PathBuf>, operation: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            operation: operation.into(),
            options: options.into(),
        }
    }

    /// A filesystem-safe digest of this key, used as the persistent cache's
    /// file name.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}

/// A cached value plus the bookkeeping the LRU needs to evict it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cached value.
    pub value: V,
    /// `(mtime_ns, size)` of the source file at the time this entry was
    /// computed; the cache is invalid if either has changed.
    pub fingerprint: (i64, u64),
    /// Estimated size of this entry in bytes, used for the cache's byte
    /// budget.
    pub bytes_estimate: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_for_equal_keys() {
        let a = CacheKey::new("/p/a.rs", "find_symbol", "depth=1");
        let b = CacheKey::new("/p/a.rs", "find_symbol", "depth=1");
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_differs_for_different_options() {
        let a = CacheKey::new("/p/a.rs", "find_symbol", "depth=1");
        let b = CacheKey::new("/p/a.rs", "find_symbol", "depth=2");
        assert_ne!(a.digest(), b.digest());
    }
}
