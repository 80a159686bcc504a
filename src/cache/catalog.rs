//! Read-through catalog orchestrator.
//!
//! [`CatalogCache`] composes the [`EntryStore`], the [`FetcherRegistry`],
//! per-provider [`FreshnessValidator`]s and the reconciler into three
//! operations:
//!
//! - [`get_catalog`](CatalogCache::get_catalog): cached read through both
//!   tiers; fetches only when neither holds the key, or when the key was
//!   flushed. A failed fetch degrades to the durable snapshot and only
//!   errors when nothing was ever stored.
//! - [`refresh_catalog`](CatalogCache::refresh_catalog): forced fetch;
//!   never errors, failures are a no-op.
//! - [`flush_catalog`](CatalogCache::flush_catalog): evict, or refresh in
//!   place without evicting first.
//!
//! # Write discipline
//!
//! A fetched catalog is fully validated and reconciled before the single
//! [`EntryStore::put`] that publishes it, so concurrent readers see either
//! the old catalog or the new one, never a mix or a gap.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::freshness::{AcceptAll, Freshness, FreshnessValidator, RequirePinned, reconcile_with};
use super::store::{DEFAULT_MAX_ENTRIES, DEFAULT_RESIDENCY, EntryStore, StoreKind, Tier};
use crate::providers::FetcherRegistry;
use crate::telemetry;
use crate::types::{Catalog, CatalogKey, FetchOptions, Provider};
use crate::{CatalogError, Result};

/// Default bound on a single upstream fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration shared by the catalog and endpoint caches.
///
/// ```rust
/// # use ratatoskr_catalog::CatalogCacheConfig;
/// # use std::time::Duration;
/// let config = CatalogCacheConfig::new()
///     .cache_dir("/tmp/catalogs")
///     .fetch_timeout(Duration::from_secs(10));
/// assert_eq!(config.residency, Duration::from_secs(300));
/// ```
#[derive(Debug, Clone)]
pub struct CatalogCacheConfig {
    /// Directory holding the durable tier. Default:
    /// `~/.cache/ratatoskr/catalog`.
    pub cache_dir: PathBuf,
    /// Bound on each upstream fetch. Default: 30s.
    pub fetch_timeout: Duration,
    /// Fast-tier residency. Default: 5 minutes.
    pub residency: Duration,
    /// Maximum keys held in the fast tier. Default: 1,000.
    pub max_entries: u64,
}

impl Default for CatalogCacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            residency: DEFAULT_RESIDENCY,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CatalogCacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn residency(mut self, residency: Duration) -> Self {
        self.residency = residency;
        self
    }

    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    pub(crate) fn store(&self, kind: StoreKind) -> EntryStore {
        EntryStore::with_limits(&self.cache_dir, kind, self.residency, self.max_entries)
    }
}

/// Default durable-tier directory: `~/.cache/ratatoskr/catalog`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("ratatoskr")
        .join("catalog")
}

/// How [`CatalogCache::flush_catalog`] treats the cached entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushMode {
    /// Drop the fast-tier copy; the next read goes to the network and falls
    /// back to the durable snapshot only if that fails.
    #[default]
    Evict,
    /// Keep serving the current copy and replace it once a background
    /// refresh completes.
    Refresh,
}

/// Read-through orchestrator for provider catalogs. Cheap to clone.
#[derive(Clone)]
pub struct CatalogCache {
    store: Arc<EntryStore>,
    fetchers: Arc<FetcherRegistry>,
    validators: Arc<HashMap<Provider, Arc<dyn FreshnessValidator>>>,
    fetch_timeout: Duration,
    /// Keys evicted by `flush_catalog` whose next read must skip the
    /// durable tier.
    flushed: Arc<Mutex<HashSet<String>>>,
}

impl CatalogCache {
    /// Create a cache over `fetchers` using `config`.
    pub fn new(config: &CatalogCacheConfig, fetchers: Arc<FetcherRegistry>) -> Self {
        Self::with_validators(config, fetchers, HashMap::new())
    }

    /// Create a cache with per-provider freshness validators. Providers
    /// without one accept every fetch.
    pub fn with_validators(
        config: &CatalogCacheConfig,
        fetchers: Arc<FetcherRegistry>,
        validators: HashMap<Provider, Arc<dyn FreshnessValidator>>,
    ) -> Self {
        Self {
            store: Arc::new(config.store(StoreKind::Models)),
            fetchers,
            validators: Arc::new(validators),
            fetch_timeout: config.fetch_timeout,
            flushed: Arc::default(),
        }
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn fetchers(&self) -> &FetcherRegistry {
        &self.fetchers
    }

    // ========================================================================
    // Registry-backed operations
    // ========================================================================

    /// Cached catalog for `options`, fetching when neither tier holds it
    /// (or it was flushed since the last fetch).
    ///
    /// Errors only with [`CatalogError::UnknownProvider`], or when the fetch
    /// failed and no snapshot was ever stored.
    pub async fn get_catalog(&self, options: &FetchOptions) -> Result<Catalog> {
        let fetcher = self.fetchers.fetcher(options.provider)?;
        let owned = options.clone();
        self.get_with(&options.key(), &options.pinned, || async move {
            fetcher.fetch(&owned).await
        })
        .await
    }

    /// Fetch unconditionally and publish the result.
    ///
    /// Never errors: on failure the current fast-tier copy (or an empty
    /// catalog) is returned and the cache is left untouched.
    pub async fn refresh_catalog(&self, options: &FetchOptions) -> Catalog {
        let key = options.key();
        let fetcher = match self.fetchers.fetcher(options.provider) {
            Ok(f) => f,
            Err(e) => {
                warn!(key = %key, error = %e, "cannot refresh catalog");
                return self.store.peek(key.as_str()).unwrap_or_default();
            }
        };
        let owned = options.clone();
        self.refresh_with(&key, &options.pinned, || async move {
            fetcher.fetch(&owned).await
        })
        .await
    }

    /// Flush the cached catalog for `options`.
    ///
    /// With [`FlushMode::Refresh`] nothing is evicted; a refresh is spawned
    /// and its handle returned. Dropping the handle detaches the task.
    pub fn flush_catalog(
        &self,
        options: &FetchOptions,
        mode: FlushMode,
    ) -> Option<JoinHandle<Catalog>> {
        let key = options.key();
        match mode {
            FlushMode::Evict => {
                debug!(key = %key, "evicting catalog from memory");
                self.flushed().insert(key.as_str().to_string());
                self.store.evict(key.as_str());
                None
            }
            FlushMode::Refresh => {
                debug!(key = %key, "refreshing catalog in background");
                let cache = self.clone();
                let options = options.clone();
                Some(tokio::spawn(
                    async move { cache.refresh_catalog(&options).await },
                ))
            }
        }
    }

    /// Whatever either tier holds for `options`, without fetching.
    pub async fn cached(&self, options: &FetchOptions) -> Option<Catalog> {
        self.store.get(options.key().as_str()).await
    }

    // ========================================================================
    // Function-driven operations
    // ========================================================================

    /// [`get_catalog`](Self::get_catalog) with a caller-supplied fetch.
    #[instrument(skip(self, key, pinned, fetch), fields(key = %key))]
    pub async fn get_with<F, Fut>(
        &self,
        key: &CatalogKey,
        pinned: &BTreeSet<String>,
        fetch: F,
    ) -> Result<Catalog>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Catalog>>,
    {
        if self.flushed().contains(key.as_str()) {
            let cache = self.store.kind().as_str();
            if let Some(catalog) = self.store.peek(key.as_str()) {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL,
                    "cache" => cache,
                    "tier" => Tier::Memory.as_str(),
                )
                .increment(1);
                return Ok(catalog);
            }
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => cache).increment(1);
            debug!("flushed; bypassing durable tier");
        } else if let Some((catalog, tier)) = self.store.lookup(key.as_str()).await {
            debug!(tier = tier.as_str(), "catalog served from cache");
            return Ok(catalog);
        }

        let result = self.fetch_or_fall_back(key, pinned, fetch).await;
        self.flushed().remove(key.as_str());
        result
    }

    async fn fetch_or_fall_back<F, Fut>(
        &self,
        key: &CatalogKey,
        pinned: &BTreeSet<String>,
        fetch: F,
    ) -> Result<Catalog>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Catalog>>,
    {
        match bounded_fetch(key.provider(), self.fetch_timeout, fetch()).await {
            Ok(fresh) => Ok(self.publish(key, pinned, fresh).await),
            Err(e) => match self.store.load_durable(key.as_str()).await {
                Some(snapshot) => {
                    metrics::counter!(telemetry::STALE_FALLBACKS_TOTAL,
                        "provider" => key.provider().as_str(),
                    )
                    .increment(1);
                    warn!(error = %e, "fetch failed; serving last known-good catalog");
                    Ok(self.store.warm(key.as_str(), snapshot))
                }
                None => Err(e),
            },
        }
    }

    /// [`refresh_catalog`](Self::refresh_catalog) with a caller-supplied
    /// fetch.
    #[instrument(skip(self, key, pinned, fetch), fields(key = %key))]
    pub async fn refresh_with<F, Fut>(
        &self,
        key: &CatalogKey,
        pinned: &BTreeSet<String>,
        fetch: F,
    ) -> Catalog
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Catalog>>,
    {
        match bounded_fetch(key.provider(), self.fetch_timeout, fetch()).await {
            Ok(fresh) => self.publish(key, pinned, fresh).await,
            Err(e) => {
                warn!(error = %e, "refresh failed; keeping current catalog");
                self.store.peek(key.as_str()).unwrap_or_default()
            }
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn flushed(&self) -> MutexGuard<'_, HashSet<String>> {
        self.flushed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate, reconcile if suspicious, and publish with a single put.
    async fn publish(
        &self,
        key: &CatalogKey,
        pinned: &BTreeSet<String>,
        fresh: Catalog,
    ) -> Catalog {
        let previous = match self.store.peek(key.as_str()) {
            Some(catalog) => Some(catalog),
            None => self.store.load_durable(key.as_str()).await,
        };

        let verdict = self.verdict(key.provider(), pinned, &fresh, previous.as_ref());
        let catalog = match (verdict, previous) {
            (Freshness::Suspicious { preserve }, Some(previous)) => {
                let merged = reconcile_with(&previous, &fresh, &preserve);
                metrics::counter!(telemetry::RECONCILIATIONS_TOTAL,
                    "provider" => key.provider().as_str(),
                )
                .increment(1);
                info!(
                    fetched = fresh.len(),
                    previous = previous.len(),
                    merged = merged.len(),
                    "suspicious fetch reconciled with previous catalog"
                );
                merged
            }
            _ => fresh,
        };

        self.store.put(key.as_str(), catalog.clone()).await;
        self.flushed().remove(key.as_str());
        catalog
    }

    fn verdict(
        &self,
        provider: Provider,
        pinned: &BTreeSet<String>,
        fresh: &Catalog,
        previous: Option<&Catalog>,
    ) -> Freshness {
        let verdict = match self.validators.get(&provider) {
            Some(validator) => validator.check(fresh, previous),
            None => AcceptAll.check(fresh, previous),
        };
        if pinned.is_empty() {
            return verdict;
        }
        let pinned = RequirePinned {
            ids: pinned.clone(),
        };
        verdict.and(pinned.check(fresh, previous))
    }
}

/// Run `fetch` under `timeout`, validate its output and record metrics.
///
/// Timeouts surface as [`CatalogError::Timeout`]; a structurally invalid
/// catalog is an error, never partially accepted.
pub(crate) async fn bounded_fetch<Fut>(
    provider: Provider,
    timeout: Duration,
    fetch: Fut,
) -> Result<Catalog>
where
    Fut: Future<Output = Result<Catalog>>,
{
    let start = Instant::now();
    let result = match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(catalog)) => catalog.validate().map(|()| catalog),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(CatalogError::Timeout(timeout)),
    };

    let status = match &result {
        Ok(_) => "ok",
        Err(CatalogError::Timeout(_)) => "timeout",
        Err(_) => "error",
    };
    metrics::counter!(telemetry::FETCHES_TOTAL,
        "provider" => provider.as_str(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::FETCH_DURATION_SECONDS,
        "provider" => provider.as_str(),
    )
    .record(start.elapsed().as_secs_f64());

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cache::freshness::MinEntries;
    use crate::types::ModelRecord;

    fn catalog(ids: &[&str]) -> Catalog {
        ids.iter()
            .map(|id| (id.to_string(), ModelRecord::new(4096)))
            .collect()
    }

    fn cache_in(dir: &std::path::Path) -> CatalogCache {
        let config = CatalogCacheConfig::new().cache_dir(dir);
        CatalogCache::new(&config, Arc::new(FetcherRegistry::new()))
    }

    #[test]
    fn config_defaults() {
        let config = CatalogCacheConfig::default();
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.residency, Duration::from_secs(300));
        assert!(config.cache_dir.ends_with("ratatoskr/catalog"));
    }

    #[tokio::test]
    async fn get_with_skips_fetch_on_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let key = CatalogKey::new(Provider::Glama);
        cache.store().put(key.as_str(), catalog(&["m1"])).await;

        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result = cache
            .get_with(&key, &BTreeSet::new(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Catalog::new())
            })
            .await
            .unwrap();
        assert_eq!(result, catalog(&["m1"]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn durable_hit_skips_fetch_and_warms_memory() {
        let dir = tempfile::tempdir().unwrap();
        let key = CatalogKey::new(Provider::Glama);
        cache_in(dir.path())
            .store()
            .put(key.as_str(), catalog(&["m1"]))
            .await;

        // A fresh instance starts with an empty fast tier.
        let cache = cache_in(dir.path());
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result = cache
            .get_with(&key, &BTreeSet::new(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(catalog(&["net"]))
            })
            .await
            .unwrap();

        assert_eq!(result, catalog(&["m1"]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.store().peek(key.as_str()), Some(catalog(&["m1"])));
    }

    #[tokio::test]
    async fn flush_forces_one_fetch_past_durable_tier() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let key = CatalogKey::new(Provider::Glama);
        let options = FetchOptions::new(Provider::Glama);
        cache.store().put(key.as_str(), catalog(&["old"])).await;

        assert!(cache.flush_catalog(&options, FlushMode::Evict).is_none());
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let fetch = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(catalog(&["new"]))
        };
        let first = cache.get_with(&key, &BTreeSet::new(), fetch).await.unwrap();
        let second = cache.get_with(&key, &BTreeSet::new(), fetch).await.unwrap();

        assert_eq!(first, catalog(&["new"]));
        assert_eq!(second, catalog(&["new"]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.flushed().is_empty());
    }

    #[tokio::test]
    async fn invalid_fetch_result_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let key = CatalogKey::new(Provider::Glama);

        let err = cache
            .get_with(&key, &BTreeSet::new(), || async {
                Ok(Catalog::new().with("bad", ModelRecord::new(0)))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert!(cache.store().peek(key.as_str()).is_none());
    }

    #[tokio::test]
    async fn suspicious_fetch_without_previous_is_stored_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogCacheConfig::new().cache_dir(dir.path());
        let mut validators: HashMap<Provider, Arc<dyn FreshnessValidator>> = HashMap::new();
        validators.insert(Provider::OpenRouter, Arc::new(MinEntries::new(50)));
        let cache =
            CatalogCache::with_validators(&config, Arc::new(FetcherRegistry::new()), validators);
        let key = CatalogKey::new(Provider::OpenRouter);

        let result = cache
            .get_with(&key, &BTreeSet::new(), || async { Ok(catalog(&["a"])) })
            .await
            .unwrap();
        assert_eq!(result, catalog(&["a"]));
    }

    #[tokio::test]
    async fn pinned_ids_survive_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_in(dir.path());
        let key = CatalogKey::new(Provider::Requesty);
        cache.store().put(key.as_str(), catalog(&["mine", "other"])).await;

        let pinned: BTreeSet<String> = ["mine".to_string()].into();
        let result = cache
            .refresh_with(&key, &pinned, || async { Ok(catalog(&["new"])) })
            .await;

        assert_eq!(result, catalog(&["mine", "new"]));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out() {
        let result = bounded_fetch(Provider::Glama, Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Catalog::new())
        })
        .await;
        assert!(matches!(result, Err(CatalogError::Timeout(_))));
    }
}
