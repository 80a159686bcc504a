//! Result of fanning one logical request out to several providers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Catalog, Provider};

/// One provider's failure inside an aggregate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: Provider,
    pub message: String,
}

/// Partial-success result of [`CatalogAggregator::aggregate`](crate::cache::CatalogAggregator::aggregate).
///
/// Every provider the caller asked about has an entry in `catalogs`, empty
/// when it failed or was skipped. Only `errors` tells the two apart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub catalogs: BTreeMap<Provider, Catalog>,
    pub errors: Vec<ProviderFailure>,
}

impl AggregateResult {
    /// Catalog for `provider`, or `None` if it was not part of the request.
    pub fn catalog(&self, provider: Provider) -> Option<&Catalog> {
        self.catalogs.get(&provider)
    }

    pub fn error_for(&self, provider: Provider) -> Option<&ProviderFailure> {
        self.errors.iter().find(|e| e.provider == provider)
    }

    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}
