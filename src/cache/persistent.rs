//! On-disk, debounced cache store. One file per cache key under
//! `<project_root>/.kadabra-broker/cache/`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tracing::warn;

use crate::error::CacheError;

use super::entry::{CacheEntry, CacheKey};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

struct Pending<V> {
    key: CacheKey,
    entry: CacheEntry<V>,
    due: Instant,
}

/// On-disk representation: the key is persisted alongside the value so
/// prefix invalidation can identify matches without a separate index.
#[derive(Serialize, Deserialize)]
struct OnDisk<V> {
    key: CacheKey,
    entry: CacheEntry<V>,
}

/// A debounced, per-key on-disk cache store.
pub struct PersistentCache<V> {
    dir: PathBuf,
    debounce: Duration,
    pending: Arc<Mutex<HashMap<CacheKey, Pending<V>>>>,
    notify: Arc<Notify>,
}

impl<V> PersistentCache<V>
where
    V: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + 'static,
{
    /// Creates a store rooted at `dir` (created if missing) with the
    /// default 500ms debounce.
    ///
    /// ## Errors
    /// Returns [`CacheError::Io`] if `dir` cannot be created.
    pub fn new(dir: PathBuf) -> Result<Self, CacheError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            debounce: DEFAULT_DEBOUNCE,
            pending: Arc::new(Mutex::new(HashMap::new())),
            notify: Arc::new(Notify::new()),
        })
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    /// Reads the persisted entry for `key`, if present and well-formed.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let path = self.path_for(key);
        let bytes = tokio::fs::read(&path).await.ok()?;
        let on_disk: OnDisk<V> = serde_json::from_slice(&bytes).ok()?;
        Some(on_disk.entry)
    }

    /// Schedules a debounced write of `entry` for `key`. Multiple puts for
    /// the same key within the debounce window coalesce into one write of
    /// the latest value.
    pub async fn put(&self, key: CacheKey, entry: CacheEntry<V>) {
        let due = Instant::now() + self.debounce;
        self.pending
            .lock()
            .await
            .insert(key.clone(), Pending { key, entry, due });
        self.notify.notify_one();

        let pending = Arc::clone(&self.pending);
        let dir = self.dir.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            Self::flush_due(&pending, &dir).await;
        });
    }

    async fn flush_due(pending: &Arc<Mutex<HashMap<CacheKey, Pending<V>>>>, dir: &PathBuf) {
        let now = Instant::now();
        let due_keys: Vec<CacheKey> = {
            let guard = pending.lock().await;
            guard
                .iter()
                .filter(|(_, p)| p.due <= now)
                .map(|(k, _)| k.clone())
                .collect()
        };
        for key in due_keys {
            let item = pending.lock().await.remove(&key);
            let Some(item) = item else { continue };
            let path = dir.join(format!("{}.json", key.digest()));
            let on_disk = OnDisk {
                key: item.key.clone(),
                entry: item.entry,
            };
            match serde_json::to_vec(&on_disk) {
                Ok(bytes) => {
                    let tmp = path.with_extension("tmp");
                    if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
                        warn!(error = %e, "failed to write cache entry");
                        continue;
                    }
                    if let Err(e) = tokio::fs::rename(&tmp, &path).await {
                        warn!(error = %e, "failed to rename cache entry into place");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize cache entry"),
            }
        }
    }

    /// Immediately flushes every pending write, ignoring their debounce
    /// deadlines. Used on graceful shutdown and by tests.
    pub async fn flush_all(&self) {
        let keys: Vec<CacheKey> = self.pending.lock().await.keys().cloned().collect();
        for key in keys {
            if let Some(mut item) = self.pending.lock().await.remove(&key) {
                item.due = Instant::now();
                self.pending.lock().await.insert(key, item);
            }
        }
        Self::flush_due(&self.pending, &self.dir).await;
    }

    /// Removes every persisted entry whose key's file is `path` or lies
    /// under it.
    pub async fn invalidate_prefix(&self, path: &std::path::Path) -> Result<(), CacheError> {
        self.pending
            .lock()
            .await
            .retain(|k, _| !(k.file.starts_with(path) || k.file == path));

        let mut read_dir = tokio::fs::read_dir(&self.dir).await?;
        // The key is persisted alongside its value (see `OnDisk`), so a full
        // directory scan with per-file content checks is the only way to
        // find matches; acceptable since invalidation is infrequent
        // relative to reads.
        while let Some(entry) = read_dir.next_entry().await? {
            let path_on_disk = entry.path();
            if path_on_disk.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = tokio::fs::read(&path_on_disk).await else {
                continue;
            };
            let Ok(on_disk) = serde_json::from_slice::<OnDisk<V>>(&bytes) else {
                continue;
            };
            if on_disk.key.file.starts_with(path) || on_disk.key.file == path {
                let _ = tokio::fs::remove_file(&path_on_disk).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_flush_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let cache: PersistentCache<String> = PersistentCache::new(dir.path().to_path_buf()).unwrap();
        let key = CacheKey::new("/p/a.rs", "op", "");
        let entry = CacheEntry {
            value: "hello".to_string(),
            fingerprint: (1, 1),
            bytes_estimate: 5,
        };
        cache.put(key.clone(), entry).await;
        cache.flush_all().await;
        let got = cache.get(&key).await.unwrap();
        assert_eq!(got.value, "hello");
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache: PersistentCache<String> = PersistentCache::new(dir.path().to_path_buf()).unwrap();
        let key = CacheKey::new("/p/missing.rs", "op", "");
        assert!(cache.get(&key).await.is_none());
    }
}
