//! A file-backed, cross-process tenant registry guarded by advisory file
//! locking.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs4::FileExt;
use tracing::warn;

use crate::error::TenantError;

use super::model::{TenantRecord, TenantStatus};

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The tenant registry: one JSON file shared by every tenant process,
/// guarded by an OS advisory lock so concurrent readers/writers don't race.
pub struct TenantRegistry {
    path: PathBuf,
}

impl TenantRegistry {
    /// Opens (without yet reading) the registry file at `path`, creating
    /// its parent directory if needed.
    ///
    /// ## Errors
    /// Returns [`TenantError::Io`] if the parent directory can't be
    /// created.
    pub fn new(path: PathBuf) -> Result<Self, TenantError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    fn with_locked<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, TenantRecord>) -> T,
    ) -> Result<T, TenantError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        let deadline = Instant::now() + LOCK_TIMEOUT;
        loop {
            if file.try_lock_exclusive().is_ok() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(TenantError::LockTimeout(LOCK_TIMEOUT));
            }
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }

        let result = self.mutate_locked(&file, f);
        let _ = file.unlock();
        result
    }

    fn mutate_locked<T>(
        &self,
        mut file: &File,
        f: impl FnOnce(&mut HashMap<String, TenantRecord>) -> T,
    ) -> Result<T, TenantError> {
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut map: HashMap<String, TenantRecord> = if contents.trim().is_empty() {
            HashMap::new()
        } else {
            match serde_json::from_str(&contents) {
                Ok(m) => m,
                Err(_) => {
                    warn!(path = %self.path.display(), "tenant registry was corrupt, resetting");
                    HashMap::new()
                }
            }
        };

        let result = f(&mut map);

        let serialized = serde_json::to_string_pretty(&map)
            .map_err(|e| TenantError::Io(std::io::Error::other(e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(serialized.as_bytes())?;
        }
        std::fs::rename(&tmp_path, &self.path)?;

        Ok(result)
    }

    /// Registers a new tenant, or overwrites an existing entry with the
    /// same id.
    pub fn register(&self, record: TenantRecord) -> Result<(), TenantError> {
        self.with_locked(|map| {
            map.insert(record.id.clone(), record);
        })
    }

    /// Removes a tenant from the registry.
    pub fn unregister(&self, id: &str) -> Result<(), TenantError> {
        self.with_locked(|map| {
            map.remove(id);
        })
    }

    /// Updates a tenant's lifecycle status.
    ///
    /// ## Errors
    /// Returns [`TenantError::NotFound`] if no tenant with `id` is
    /// registered.
    pub fn update_status(&self, id: &str, status: TenantStatus) -> Result<(), TenantError> {
        self.with_locked(|map| {
            map.get_mut(id).map(|r| r.status = status)
        })?
        .ok_or_else(|| TenantError::NotFound(id.to_string()))
    }

    /// Updates a tenant's last-observed health sample.
    ///
    /// ## Errors
    /// Returns [`TenantError::NotFound`] if no tenant with `id` is
    /// registered.
    pub fn update_health(&self, id: &str, rss_mb: f64, cpu_percent: f64) -> Result<(), TenantError> {
        self.with_locked(|map| {
            map.get_mut(id).map(|r| {
                r.rss_mb = Some(rss_mb);
                r.cpu_percent = Some(cpu_percent);
            })
        })?
        .ok_or_else(|| TenantError::NotFound(id.to_string()))
    }

    /// Bumps a tenant's `last_activity_ms` to `now_ms`.
    ///
    /// ## Errors
    /// Returns [`TenantError::NotFound`] if no tenant with `id` is
    /// registered.
    pub fn mark_activity(&self, id: &str, now_ms: i64) -> Result<(), TenantError> {
        self.with_locked(|map| map.get_mut(id).map(|r| r.last_activity_ms = now_ms))?
            .ok_or_else(|| TenantError::NotFound(id.to_string()))
    }

    /// Fetches a single tenant's record.
    #[must_use]
    pub fn get_tenant(&self, id: &str) -> Result<Option<TenantRecord>, TenantError> {
        self.with_locked(|map| map.get(id).cloned())
    }

    /// Lists every registered tenant.
    pub fn list_all(&self) -> Result<Vec<TenantRecord>, TenantError> {
        self.with_locked(|map| map.values().cloned().collect())
    }

    /// Lists tenants currently in the `Running` status.
    pub fn list_running(&self) -> Result<Vec<TenantRecord>, TenantError> {
        self.with_locked(|map| {
            map.values()
                .filter(|r| r.status == TenantStatus::Running)
                .cloned()
                .collect()
        })
    }

    /// Removes tenants whose `last_activity_ms` is older than
    /// `now_ms - stale_after_ms`.
    pub fn cleanup_stale(&self, now_ms: i64, stale_after_ms: i64) -> Result<Vec<String>, TenantError> {
        self.with_locked(|map| {
            let stale: Vec<String> = map
                .iter()
                .filter(|(_, r)| now_ms - r.last_activity_ms > stale_after_ms)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &stale {
                map.remove(id);
            }
            stale
        })
    }

    /// Resets the registry to empty. Used by tests and by the `tenants`
    /// CLI subcommand's reset path.
    pub fn clear_all(&self) -> Result<(), TenantError> {
        self.with_locked(|map| map.clear())
    }

    /// The path to the registry file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TenantRegistry::new(dir.path().join("tenants.json")).unwrap();
        registry
            .register(TenantRecord::new("t1", "/proj", 1000))
            .unwrap();
        let got = registry.get_tenant("t1").unwrap().unwrap();
        assert_eq!(got.project_root, "/proj");
    }

    #[test]
    fn test_update_status_missing_tenant_errors() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TenantRegistry::new(dir.path().join("tenants.json")).unwrap();
        let err = registry.update_status("missing", TenantStatus::Running);
        assert!(matches!(err, Err(TenantError::NotFound(_))));
    }

    #[test]
    fn test_corrupt_file_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tenants.json");
        std::fs::write(&path, "not json").unwrap();
        let registry = TenantRegistry::new(path).unwrap();
        let all = registry.list_all().unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_cleanup_stale_removes_old_entries() {
        let dir = tempfile::tempdir().unwrap();
        let registry = TenantRegistry::new(dir.path().join("tenants.json")).unwrap();
        registry
            .register(TenantRecord::new("old", "/proj", 0))
            .unwrap();
        registry
            .register(TenantRecord::new("fresh", "/proj", 9_000))
            .unwrap();
        let removed = registry.cleanup_stale(10_000, 5_000).unwrap();
        assert_eq!(removed, vec!["old".to_string()]);
        assert_eq!(registry.list_all().unwrap().len(), 1);
    }
}
