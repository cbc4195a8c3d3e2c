//! In-flight request coalescing: concurrent callers asking for the same
//! key while a computation is already running share its result instead of
//! recomputing it.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::Mutex;

use crate::error::Error;

/// Default time a completed (but not yet evicted) computation is still
/// shared with new callers before it's dropped from the in-flight table.
const DEFAULT_TTL: Duration = Duration::from_secs(5);

type SharedResult<V> = Shared<BoxFuture<'static, Result<V, CoalescerError>>>;

/// A cloneable wrapper around [`Error`] so it can live in a [`Shared`]
/// future, which requires `Clone`.
#[derive(Clone, Debug)]
pub struct CoalescerError(pub Arc<Error>);

impl std::fmt::Display for CoalescerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for CoalescerError {}

impl From<Error> for CoalescerError {
    fn from(e: Error) -> Self {
        Self(Arc::new(e))
    }
}

/// Coalesces concurrent requests for the same key into a single in-flight
/// computation.
pub struct Coalescer<K, V> {
    inflight: Arc<Mutex<HashMap<K, SharedResult<V>>>>,
    ttl: Duration,
}

impl<K, V> Default for Coalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a coalescer whose completed entries expire after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Runs `compute` for `key`, or joins an already-running computation for
    /// the same key. The underlying future starts executing only once per
    /// key until it settles and its TTL elapses.
    pub async fn get_or_compute<F>(&self, key: K, compute: F) -> Result<V, Error>
    where
        F: std::future::Future<Output = Result<V, Error>> + Send + 'static,
    {
        let shared = {
            let mut guard = self.inflight.lock().await;
            if let Some(existing) = guard.get(&key) {
                existing.clone()
            } else {
                let boxed: BoxFuture<'static, Result<V, CoalescerError>> =
                    compute.map_err(CoalescerError::from).boxed();
                let shared: SharedResult<V> = boxed.shared();
                guard.insert(key.clone(), shared.clone());

                let inflight = Arc::clone(&self.inflight);
                let ttl = self.ttl;
                let key_for_expiry = key.clone();
                let shared_for_expiry = shared.clone();
                tokio::spawn(async move {
                    // Wait for the computation to settle before starting the
                    // expiry countdown, so slow callers still join it.
                    let _ = shared_for_expiry.clone().await;
                    tokio::time::sleep(ttl).await;
                    let mut guard = inflight.lock().await;
                    if let Some(current) = guard.get(&key_for_expiry) {
                        if current.ptr_eq(&shared_for_expiry) {
                            guard.remove(&key_for_expiry);
                        }
                    }
                });

                shared
            }
        };

        shared.await.map_err(|e| e.0.clone_via_display())
    }

    /// Drops any in-flight or cached computation for keys whose associated
    /// file is `path` or lies under it. Intended to be called by write
    /// tools so subsequent reads don't join a stale in-flight future.
    pub async fn invalidate<P>(&self, matches: P)
    where
        P: Fn(&K) -> bool,
    {
        self.inflight.lock().await.retain(|k, _| !matches(k));
    }
}

// `Error` isn't `Clone`, so when a coalesced computation fails we can only
// hand one caller the original; everyone else gets a reconstructed error
// carrying the same message via `Display`.
trait ClonedDisplayError {
    fn clone_via_display(&self) -> Error;
}

impl ClonedDisplayError for Error {
    fn clone_via_display(&self) -> Error {
        Error::Config(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrent_calls_share_one_computation() {
        let coalescer: Arc<Coalescer<String, u32>> = Arc::new(Coalescer::new(Duration::from_millis(50)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coalescer = Arc::clone(&coalescer);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coalescer
                    .get_or_compute("k".to_string(), async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(42)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sequential_calls_after_ttl_recompute() {
        let coalescer: Coalescer<String, u32> = Coalescer::new(Duration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_a = Arc::clone(&calls);
        let first = coalescer
            .get_or_compute("k".to_string(), async move {
                calls_a.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(1)
            })
            .await
            .unwrap();
        assert_eq!(first, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        let calls_b = Arc::clone(&calls);
        let second = coalescer
            .get_or_compute("k".to_string(), async move {
                calls_b.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(2)
            })
            .await
            .unwrap();
        assert_eq!(second, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
