//! Fetch options passed through to provider fetchers.

use std::collections::BTreeSet;
use std::fmt;

use super::{CatalogKey, Provider};

/// What to fetch and how to reach it.
///
/// The API key is handed to the fetcher as-is; the cache never inspects it
/// and it never contributes to the cache key.
#[derive(Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub provider: Provider,
    /// Base URL for self-hosted or proxied instances.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Item ids that must not vanish because of an incomplete listing
    /// (e.g. the currently selected model).
    pub pinned: BTreeSet<String>,
}

impl FetchOptions {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            base_url: None,
            api_key: None,
            pinned: BTreeSet::new(),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn pin(mut self, id: impl Into<String>) -> Self {
        self.pinned.insert(id.into());
        self
    }

    /// Cache key these options resolve to.
    pub fn key(&self) -> CatalogKey {
        CatalogKey::from_options(self)
    }
}

impl From<Provider> for FetchOptions {
    fn from(provider: Provider) -> Self {
        Self::new(provider)
    }
}

// Keep API keys out of logs.
impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("pinned", &self.pinned)
            .finish()
    }
}
