//! Fan-out across providers with per-provider failure isolation.

use futures_util::future::join_all;
use tracing::{debug, warn};

use super::catalog::CatalogCache;
use crate::CatalogError;
use crate::types::{AggregateResult, Catalog, FetchOptions, Provider, ProviderFailure};

/// Issues one [`CatalogCache::get_catalog`] per requested provider and
/// assembles whatever succeeded.
#[derive(Clone)]
pub struct CatalogAggregator {
    cache: CatalogCache,
}

impl CatalogAggregator {
    pub fn new(cache: CatalogCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CatalogCache {
        &self.cache
    }

    /// Fetch every request concurrently.
    ///
    /// Every requested provider is present in the result, empty unless its
    /// fetch succeeded. A failure adds one entry to `errors` and never
    /// affects sibling requests. With `active` set, only that provider is
    /// fetched; the rest stay empty and are not reported as errors.
    ///
    /// The result holds one catalog per provider, so only the first request
    /// for a provider is fetched. Later ones (e.g. a second base URL) are
    /// reported in `errors` instead of overwriting it.
    pub async fn aggregate(
        &self,
        requests: &[FetchOptions],
        active: Option<Provider>,
    ) -> AggregateResult {
        let mut result = AggregateResult::default();
        let mut unique = Vec::with_capacity(requests.len());
        for request in requests {
            if result.catalogs.contains_key(&request.provider) {
                warn!(provider = %request.provider, "duplicate provider request skipped");
                result.errors.push(ProviderFailure {
                    provider: request.provider,
                    message: CatalogError::Configuration(format!(
                        "duplicate request for provider {}",
                        request.provider
                    ))
                    .to_string(),
                });
                continue;
            }
            result.catalogs.insert(request.provider, Catalog::new());
            unique.push(request);
        }

        let selected: Vec<&FetchOptions> = unique
            .into_iter()
            .filter(|r| active.is_none_or(|p| p == r.provider))
            .collect();
        debug!(
            requested = requests.len(),
            fetching = selected.len(),
            "aggregating provider catalogs"
        );

        let outcomes = join_all(selected.iter().map(|options| async move {
            (options.provider, self.cache.get_catalog(options).await)
        }))
        .await;

        for (provider, outcome) in outcomes {
            match outcome {
                Ok(catalog) => {
                    result.catalogs.insert(provider, catalog);
                }
                Err(e) => {
                    warn!(provider = %provider, error = %e, "provider catalog unavailable");
                    result.errors.push(ProviderFailure {
                        provider,
                        message: e.to_string(),
                    });
                }
            }
        }
        result
    }
}
