//! Filesystem watch support: invalidates cache entries the moment their
//! source file changes on disk, rather than waiting for the next
//! fingerprint check to notice.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

/// Watches a project root and invokes a callback with the changed path for
/// every create/modify/remove event. The callback is expected to call
/// `SessionCache::invalidate_prefix`/`PersistentCache::invalidate_prefix`
/// for the changed path.
pub struct CacheWatcher {
    _watcher: RecommendedWatcher,
}

impl CacheWatcher {
    /// Starts watching `root` recursively.
    ///
    /// ## Errors
    /// Returns [`notify::Error`] if the underlying OS watch can't be
    /// established (e.g. inotify instance limits reached).
    pub fn new(root: &Path, on_change: impl Fn(PathBuf) + Send + Sync + 'static) -> notify::Result<Self> {
        let on_change = Arc::new(on_change);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) {
                    for path in event.paths {
                        on_change(path);
                    }
                }
            }
            Err(e) => warn!(error = %e, "filesystem watch error"),
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;
        Ok(Self { _watcher: watcher })
    }
}
