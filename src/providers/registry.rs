//! Fetcher registry: provider → fetch strategy.
//!
//! The cache core never knows how many providers exist or how any of them
//! is queried; it asks the registry for the strategy registered under a
//! [`Provider`] and calls it through the [`CatalogFetcher`] /
//! [`EndpointFetcher`] traits. A provider without a registered strategy is
//! a configuration error and is reported as
//! [`CatalogError::UnknownProvider`].

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{CatalogFetcher, EndpointFetcher};
use crate::types::Provider;
use crate::{CatalogError, Result};

/// Mapping from provider to its catalog and endpoint fetch strategies.
#[derive(Clone, Default)]
pub struct FetcherRegistry {
    catalog: HashMap<Provider, Arc<dyn CatalogFetcher>>,
    endpoints: HashMap<Provider, Arc<dyn EndpointFetcher>>,
}

impl FetcherRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the catalog fetcher for `provider`.
    pub fn register(&mut self, provider: Provider, fetcher: Arc<dyn CatalogFetcher>) {
        self.catalog.insert(provider, fetcher);
    }

    /// Register (or replace) the endpoint fetcher for `provider`.
    pub fn register_endpoints(&mut self, provider: Provider, fetcher: Arc<dyn EndpointFetcher>) {
        self.endpoints.insert(provider, fetcher);
    }

    /// Catalog fetcher for `provider`.
    pub fn fetcher(&self, provider: Provider) -> Result<Arc<dyn CatalogFetcher>> {
        self.catalog
            .get(&provider)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownProvider(provider.to_string()))
    }

    /// Endpoint fetcher for `provider`.
    pub fn endpoint_fetcher(&self, provider: Provider) -> Result<Arc<dyn EndpointFetcher>> {
        self.endpoints
            .get(&provider)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownProvider(provider.to_string()))
    }

    /// Whether a catalog fetcher is registered for `provider`.
    pub fn has(&self, provider: Provider) -> bool {
        self.catalog.contains_key(&provider)
    }

    /// Providers with a registered catalog fetcher, sorted.
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.catalog.keys().copied().collect();
        providers.sort();
        providers
    }
}
