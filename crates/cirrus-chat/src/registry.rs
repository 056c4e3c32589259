//! Lazy, process-wide `providerId -> StreamingLanguageModel` registry.
//!
//! A keyed generalization of double-checked-locking single-instance
//! lazy-init: each slot is a `dashmap`-backed singleflight future rather
//! than a status enum + mutex pair, since only one caller's `build` future
//! ever needs to run per key regardless of how many callers are waiting
//! on it.
//!
//! `reload()` is a copy-on-write swap of the whole map via `ArcSwap`: the
//! generation a caller's `get()` observed via `load_full()` is a pinned
//! snapshot, so a stream that resolved its provider against generation N
//! keeps its `Arc<dyn StreamingLanguageModel>` regardless of a later
//! `reload()` publishing generation N+1 — ongoing streams keep their
//! original provider binding, only new streams see the reload.

use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use cirrus_error::CirrusError;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::provider::{ProviderKind, StreamingLanguageModel};

type ProviderFuture = Shared<BoxFuture<'static, Result<Arc<dyn StreamingLanguageModel>, CirrusError>>>;
type Generation = DashMap<ProviderKind, ProviderFuture>;

/// Constructs a provider instance for a [`ProviderKind`]. The sole extension
/// point a concrete deployment implements (no concrete cloud SDK binding is
/// carried in this crate).
#[async_trait]
pub trait ProviderBuilder: Send + Sync {
    async fn build(&self, kind: ProviderKind) -> Result<Arc<dyn StreamingLanguageModel>, CirrusError>;
}

pub struct ProviderRegistry {
    generation: ArcSwap<Generation>,
    builder: Arc<dyn ProviderBuilder>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(builder: Arc<dyn ProviderBuilder>) -> Self {
        Self { generation: ArcSwap::from_pointee(DashMap::new()), builder }
    }

    /// Resolve `provider_id`, building it if this is the first call for it
    /// in the current generation. `provider_id` is rejected before it ever
    /// reaches the singleflight map or the builder unless it names one of
    /// [`ProviderKind`]'s known variants. Concurrent callers for the same
    /// kind within the same generation share one in-flight build.
    pub async fn get(&self, provider_id: &str) -> Result<Arc<dyn StreamingLanguageModel>, CirrusError> {
        let kind = ProviderKind::from_str(provider_id)?;
        let generation = self.generation.load_full();
        let fut = if let Some(existing) = generation.get(&kind) {
            existing.clone()
        } else {
            let builder = Arc::clone(&self.builder);
            let built: ProviderFuture = async move { builder.build(kind).await }.boxed().shared();
            generation.entry(kind).or_insert(built).clone()
        };
        fut.await
    }

    /// Invalidate every cached instance. A build already in flight when
    /// `reload` is called belongs to the discarded generation: it still
    /// completes (its caller still gets an answer) but is never observed by
    /// a `get()` call that arrives after this returns.
    pub fn reload(&self) {
        self.generation.store(Arc::new(DashMap::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, BoxStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct StubProvider {
        allowlist: Vec<String>,
    }

    #[async_trait]
    impl StreamingLanguageModel for StubProvider {
        fn model_allowlist(&self) -> &[String] {
            &self.allowlist
        }

        fn default_model(&self) -> &str {
            "default"
        }

        async fn stream(&self, _messages: &[cirrus_guardrails::Message], _model: &str, _cancellation: CancellationToken) -> Result<BoxStream<'static, Result<crate::provider::StreamingChunk, CirrusError>>, CirrusError> {
            Ok(stream::empty().boxed())
        }
    }

    struct CountingBuilder {
        builds: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProviderBuilder for CountingBuilder {
        async fn build(&self, kind: ProviderKind) -> Result<Arc<dyn StreamingLanguageModel>, CirrusError> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = kind;
            Ok(Arc::new(StubProvider { allowlist: vec!["default".into()] }))
        }
    }

    #[tokio::test]
    async fn concurrent_get_for_the_same_id_shares_one_build() {
        let builds = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(ProviderRegistry::new(Arc::new(CountingBuilder { builds: builds.clone() })));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.get("anthropic").await }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reload_forces_a_fresh_build_for_the_next_caller() {
        let builds = Arc::new(AtomicUsize::new(0));
        let registry = ProviderRegistry::new(Arc::new(CountingBuilder { builds: builds.clone() }));

        let first = registry.get("anthropic").await.unwrap();
        registry.reload();
        let second = registry.get("anthropic").await.unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(first.default_model(), second.default_model());
    }

    #[tokio::test]
    async fn unregistered_provider_kind_is_rejected_before_any_build() {
        let builds = Arc::new(AtomicUsize::new(0));
        let registry = ProviderRegistry::new(Arc::new(CountingBuilder { builds: builds.clone() }));

        let err = registry.get("made-up-provider").await.unwrap_err();
        assert_eq!(err.code(), "unknown_provider_kind");
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn independent_provider_ids_build_independently() {
        let builds = Arc::new(AtomicUsize::new(0));
        let registry = ProviderRegistry::new(Arc::new(CountingBuilder { builds: builds.clone() }));
        let a = registry.get("anthropic");
        let b = registry.get("openai");
        let (a, b) = tokio::join!(a, b);
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }
}
