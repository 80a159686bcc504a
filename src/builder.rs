//! Builder for configuring catalog cache instances

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{
    CatalogAggregator, CatalogCache, CatalogCacheConfig, EndpointCache, FreshnessValidator,
    MinEntries, WarmupConfig, WarmupScheduler,
};
use crate::providers::{CatalogFetcher, EndpointFetcher, FetcherRegistry};
use crate::types::Provider;
use crate::{CatalogError, Result};

/// The caches a process owns, sharing one fetcher registry and cache
/// directory.
///
/// Construct with [`Catalogs::builder`]. Both caches are cheap to clone.
#[derive(Clone)]
pub struct Catalogs {
    pub catalog: CatalogCache,
    pub endpoints: EndpointCache,
}

impl Catalogs {
    /// Create a new builder for configuring the caches.
    pub fn builder() -> CatalogCacheBuilder {
        CatalogCacheBuilder::new()
    }

    /// Aggregator over the catalog cache.
    pub fn aggregator(&self) -> CatalogAggregator {
        CatalogAggregator::new(self.catalog.clone())
    }

    /// Start the background warmup. See [`WarmupScheduler::spawn`].
    pub fn spawn_warmup(&self, config: WarmupConfig) -> JoinHandle<()> {
        WarmupScheduler::spawn(self.catalog.clone(), config)
    }
}

/// Builder for [`Catalogs`].
///
/// ```rust,no_run
/// use ratatoskr_catalog::{Catalogs, FetchOptions, Provider};
///
/// # async fn run() -> ratatoskr_catalog::Result<()> {
/// let catalogs = Catalogs::builder()
///     .cache_dir("/var/cache/my-app/catalog")
///     .openrouter()
///     .min_entries(Provider::OpenRouter, 50)
///     .build()?;
///
/// let models = catalogs
///     .catalog
///     .get_catalog(&FetchOptions::new(Provider::OpenRouter))
///     .await?;
/// println!("{} models", models.len());
/// # Ok(())
/// # }
/// ```
pub struct CatalogCacheBuilder {
    config: CatalogCacheConfig,
    fetchers: FetcherRegistry,
    validators: HashMap<Provider, Arc<dyn FreshnessValidator>>,
}

impl CatalogCacheBuilder {
    pub fn new() -> Self {
        Self {
            config: CatalogCacheConfig::default(),
            fetchers: FetcherRegistry::new(),
            validators: HashMap::new(),
        }
    }

    /// Replace the whole cache configuration.
    pub fn config(mut self, config: CatalogCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the directory holding the durable tier.
    pub fn cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = path.into();
        self
    }

    /// Set the bound on each upstream fetch (default: 30s).
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    /// Set the fast-tier residency (default: 5 minutes).
    pub fn residency(mut self, residency: Duration) -> Self {
        self.config.residency = residency;
        self
    }

    /// Set the fast-tier capacity (default: 1,000 keys).
    pub fn max_entries(mut self, n: u64) -> Self {
        self.config.max_entries = n;
        self
    }

    /// Register a catalog fetcher for `provider`.
    pub fn fetcher(mut self, provider: Provider, fetcher: Arc<dyn CatalogFetcher>) -> Self {
        self.fetchers.register(provider, fetcher);
        self
    }

    /// Register an endpoint fetcher for `provider`.
    pub fn endpoint_fetcher(mut self, provider: Provider, fetcher: Arc<dyn EndpointFetcher>) -> Self {
        self.fetchers.register_endpoints(provider, fetcher);
        self
    }

    /// Install a freshness validator for `provider`.
    pub fn validator(mut self, provider: Provider, validator: Arc<dyn FreshnessValidator>) -> Self {
        self.validators.insert(provider, validator);
        self
    }

    /// Treat fetches for `provider` with fewer than `min` entries as
    /// suspicious.
    pub fn min_entries(self, provider: Provider, min: usize) -> Self {
        self.validator(provider, Arc::new(MinEntries::new(min)))
    }

    /// Register the OpenRouter catalog and endpoint fetchers.
    #[cfg(feature = "openrouter")]
    pub fn openrouter(self) -> Self {
        self.openrouter_compatible(Provider::OpenRouter, None)
    }

    /// Register an OpenRouter-shaped fetcher for `provider`, optionally at a
    /// custom base URL.
    #[cfg(feature = "openrouter")]
    pub fn openrouter_compatible(self, provider: Provider, base_url: Option<&str>) -> Self {
        use crate::providers::OpenRouterFetcher;

        let fetcher = Arc::new(match base_url {
            Some(url) => OpenRouterFetcher::with_base_url(url),
            None => OpenRouterFetcher::new(),
        });
        self.fetcher(provider, fetcher.clone())
            .endpoint_fetcher(provider, fetcher)
    }

    /// Build the caches.
    ///
    /// Fails with [`CatalogError::Configuration`] when a bound is zero.
    pub fn build(self) -> Result<Catalogs> {
        if self.config.fetch_timeout.is_zero() {
            return Err(CatalogError::Configuration(
                "fetch timeout must be non-zero".to_string(),
            ));
        }
        if self.config.residency.is_zero() {
            return Err(CatalogError::Configuration(
                "fast-tier residency must be non-zero".to_string(),
            ));
        }
        if self.config.max_entries == 0 {
            return Err(CatalogError::Configuration(
                "max_entries must be at least 1".to_string(),
            ));
        }

        debug!(
            cache_dir = %self.config.cache_dir.display(),
            providers = ?self.fetchers.providers(),
            "building catalog caches"
        );

        let fetchers = Arc::new(self.fetchers);
        Ok(Catalogs {
            catalog: CatalogCache::with_validators(&self.config, fetchers.clone(), self.validators),
            endpoints: EndpointCache::new(&self.config, fetchers),
        })
    }
}

impl Default for CatalogCacheBuilder {
    fn default() -> Self {
        Self::new()
    }
}
