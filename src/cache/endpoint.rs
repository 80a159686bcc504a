//! Single-flight endpoint cache.
//!
//! Endpoint lists are keyed by `(provider, item)`, a space far too large to
//! pre-warm. What matters here is that many callers racing for the same
//! uncached key cost exactly one upstream call.
//!
//! # Lookup order
//!
//! 1. Fast tier hit: returned immediately.
//! 2. Durable tier hit: returned immediately; a background refresh starts
//!    unless one is already in flight (stale-while-revalidate).
//! 3. A fetch for the key is in flight: the caller awaits the shared result.
//! 4. Otherwise a new fetch is spawned and registered before anyone awaits it.
//!
//! Each fetch runs in its own tokio task and stores its result there, so a
//! caller that gives up never cancels work other callers are waiting on.
//! The bookkeeping map is guarded by a plain mutex that is never held across
//! an `.await`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use super::catalog::{CatalogCacheConfig, bounded_fetch};
use super::store::{EntryStore, StoreKind, Tier};
use crate::providers::FetcherRegistry;
use crate::telemetry;
use crate::types::{Catalog, EndpointKey, FetchOptions, Provider};
use crate::{CatalogError, Result};

type SharedFetch = Shared<BoxFuture<'static, Result<Catalog>>>;

struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

struct Inner {
    store: EntryStore,
    fetchers: Arc<FetcherRegistry>,
    fetch_timeout: Duration,
    in_flight: Mutex<HashMap<EndpointKey, InFlight>>,
    generation: AtomicU64,
}

impl Inner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<EndpointKey, InFlight>> {
        // The map holds no invariant a panicking holder could break halfway.
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the in-flight entry for `key` if it still belongs to `generation`.
    fn settle(&self, key: &EndpointKey, generation: u64) {
        let mut in_flight = self.in_flight();
        if in_flight
            .get(key)
            .is_some_and(|flight| flight.generation == generation)
        {
            in_flight.remove(key);
        }
    }
}

/// Coalescing cache for per-item endpoint catalogs. Cheap to clone.
#[derive(Clone)]
pub struct EndpointCache {
    inner: Arc<Inner>,
}

impl EndpointCache {
    /// Create a cache over `fetchers` using `config`. Durable files use the
    /// `endpoints` suffix.
    pub fn new(config: &CatalogCacheConfig, fetchers: Arc<FetcherRegistry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: config.store(StoreKind::Endpoints),
                fetchers,
                fetch_timeout: config.fetch_timeout,
                in_flight: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn store(&self) -> &EntryStore {
        &self.inner.store
    }

    /// Number of fetches currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight().len()
    }

    /// Endpoint catalog for `item_id` offered by `provider`.
    ///
    /// Fails only with [`CatalogError::UnknownProvider`]; upstream failures
    /// degrade to the durable copy, or an empty catalog.
    pub async fn get_endpoint_catalog(
        &self,
        provider: Provider,
        item_id: &str,
        options: &FetchOptions,
    ) -> Result<Catalog> {
        let fetcher = self.inner.fetchers.endpoint_fetcher(provider)?;
        let key = EndpointKey::new(provider, item_id);
        let item_id = item_id.to_string();
        let options = options.clone();
        let catalog = self
            .get_with(&key, move || async move {
                fetcher.fetch_endpoints(&item_id, &options).await
            })
            .await;
        Ok(catalog)
    }

    /// Drop the fast-tier copy for `(provider, item_id)`. The durable file is
    /// kept.
    pub fn flush_endpoint_catalog(&self, provider: Provider, item_id: &str) {
        let key = EndpointKey::new(provider, item_id);
        debug!(key = %key, "evicting endpoint catalog from memory");
        self.inner.store.evict(&key.file_stem());
    }

    /// Read through the cache, coalescing concurrent misses onto one call of
    /// `fetch`.
    pub async fn get_with<F, Fut>(&self, key: &EndpointKey, fetch: F) -> Catalog
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Catalog>> + Send + 'static,
    {
        let stem = key.file_stem();
        match self.inner.store.lookup(&stem).await {
            Some((catalog, Tier::Memory)) => return catalog,
            Some((catalog, Tier::Disk)) => {
                let (_, started) = self.join_or_start(key, fetch);
                if started {
                    debug!(key = %key, "serving durable copy while revalidating");
                }
                return catalog;
            }
            None => {}
        }

        let (flight, started) = self.join_or_start(key, fetch);
        if !started {
            metrics::counter!(telemetry::COALESCED_TOTAL,
                "provider" => key.provider.as_str(),
            )
            .increment(1);
            debug!(key = %key, "joining in-flight endpoint fetch");
        }

        match flight.await {
            Ok(catalog) if !catalog.is_empty() => catalog,
            _ => self
                .inner
                .store
                .load_durable(&stem)
                .await
                .unwrap_or_default(),
        }
    }

    /// Return the in-flight fetch for `key`, starting one with `fetch` if
    /// there is none. The flag is `true` when this call started it.
    fn join_or_start<F, Fut>(&self, key: &EndpointKey, fetch: F) -> (SharedFetch, bool)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Catalog>> + Send + 'static,
    {
        let mut in_flight = self.inner.in_flight();
        if let Some(flight) = in_flight.get(key) {
            return (flight.fetch.clone(), false);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        // Registered under the lock, so `settle` cannot run before the insert.
        let task = tokio::spawn(async move {
            let result = bounded_fetch(task_key.provider, inner.fetch_timeout, fetch()).await;
            match &result {
                Ok(catalog) if !catalog.is_empty() => {
                    inner.store.put(&task_key.file_stem(), catalog.clone()).await;
                }
                Ok(_) => debug!(key = %task_key, "endpoint fetch returned nothing; not stored"),
                Err(e) => warn!(key = %task_key, error = %e, "endpoint fetch failed"),
            }
            inner.settle(&task_key, generation);
            result
        });

        let fetch = async move {
            task.await
                .unwrap_or_else(|e| Err(CatalogError::Http(format!("endpoint fetch aborted: {e}"))))
        }
        .boxed()
        .shared();

        in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                fetch: fetch.clone(),
            },
        );
        (fetch, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelRecord;

    fn cache_in(dir: &std::path::Path) -> EndpointCache {
        let config = CatalogCacheConfig::new().cache_dir(dir);
        EndpointCache::new(&config, Arc::new(FetcherRegistry::new()))
    }

    fn offers(ids: &[&str]) -> Catalog {
        ids.iter()
            .map(|id| (id.to_string(), ModelRecord::new(8192)))
            .collect()
    }

    #[tokio::test]
    async fn successful_fetch_is_stored_and_settled() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let key = EndpointKey::new(Provider::OpenRouter, "anthropic/claude-sonnet-4");

        let result = cache
            .get_with(&key, || async { Ok(offers(&["anthropic"])) })
            .await;

        assert_eq!(result, offers(&["anthropic"]));
        assert_eq!(cache.in_flight_count(), 0);
        assert_eq!(cache.store().peek(&key.file_stem()), Some(offers(&["anthropic"])));
        let path = cache.store().durable_path(&key.file_stem());
        assert!(path.starts_with(dir.path()));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn failed_fetch_without_durable_copy_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let key = EndpointKey::new(Provider::OpenRouter, "x/y");

        let result = cache
            .get_with(&key, || async { Err(CatalogError::Http("down".into())) })
            .await;

        assert!(result.is_empty());
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn empty_fetch_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let key = EndpointKey::new(Provider::OpenRouter, "x/y");

        let result = cache.get_with(&key, || async { Ok(Catalog::new()) }).await;

        assert!(result.is_empty());
        assert!(cache.store().peek(&key.file_stem()).is_none());
    }

    #[tokio::test]
    async fn unknown_provider_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());

        let err = cache
            .get_endpoint_catalog(Provider::Glama, "x/y", &FetchOptions::new(Provider::Glama))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownProvider(_)));
    }
}
