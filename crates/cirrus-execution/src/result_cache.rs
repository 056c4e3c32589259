//! Singleflight result cache: at-most-one in-flight build per fingerprint.
//! Concurrent readers for the same fingerprint share the in-flight
//! computation; independent fingerprints proceed in parallel. Failure is
//! not cached — a failed build's entry is removed so the next caller
//! retries from scratch.

use std::future::Future;
use std::sync::Arc;

use cirrus_error::CirrusError;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};

type InFlight<V> = Shared<BoxFuture<'static, Result<V, CirrusError>>>;

pub struct ResultCache<V: Clone + Send + Sync + 'static> {
    in_flight: DashMap<String, InFlight<V>>,
}

impl<V: Clone + Send + Sync + 'static> Default for ResultCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + Sync + 'static> ResultCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self { in_flight: DashMap::new() }
    }

    /// Returns the artifact for `fingerprint`, building it with `build` if no
    /// build is already in flight. `build` is called at most once per
    /// concurrently-requested fingerprint.
    pub async fn get_or_build<F>(&self, fingerprint: &str, build: F) -> Result<V, CirrusError>
    where
        F: Future<Output = Result<V, CirrusError>> + Send + 'static,
    {
        let shared = {
            if let Some(existing) = self.in_flight.get(fingerprint) {
                existing.clone()
            } else {
                let fut: InFlight<V> = build.boxed().shared();
                self.in_flight.entry(fingerprint.to_string()).or_insert_with(|| fut).clone()
            }
        };

        let result = shared.await;
        // Whether it succeeded or failed, this fingerprint's build is done —
        // stop sharing it so the next caller (success: rebuild fresh,
        // failure: retry) starts a new in-flight future.
        self.in_flight.remove(fingerprint);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_build() {
        let cache = Arc::new(ResultCache::<u32>::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let builds = Arc::clone(&builds);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_build("fp-1", async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, CirrusError>(42)
                    })
                    .await
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), 42);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn independent_fingerprints_build_independently() {
        let cache = ResultCache::<u32>::new();
        let a = cache.get_or_build("a", async { Ok::<_, CirrusError>(1) });
        let b = cache.get_or_build("b", async { Ok::<_, CirrusError>(2) });
        assert_eq!(tokio::join!(a, b), (Ok(1), Ok(2)));
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let cache = ResultCache::<u32>::new();
        let first = cache.get_or_build("fp", async { Err::<u32, _>(CirrusError::external_cloud("boom", "boom")) }).await;
        assert!(first.is_err());
        let second = cache.get_or_build("fp", async { Ok::<_, CirrusError>(7) }).await;
        assert_eq!(second.unwrap(), 7);
    }
}
