//! Fetch strategy traits.
//!
//! One implementation per provider turns that provider's proprietary listing
//! response into a normalized [`Catalog`]. Fetchers are deliberately dumb:
//! they must not cache or retry, and a fetch either yields a complete catalog
//! or an error, never a partial one. Caching, timeouts and fallback belong
//! to [`crate::cache`].
//!
//! # Example
//!
//! ```ignore
//! #[async_trait]
//! impl CatalogFetcher for MyRouter {
//!     fn name(&self) -> &str { "my-router" }
//!
//!     async fn fetch(&self, options: &FetchOptions) -> Result<Catalog> {
//!         let body = self.http.get(&self.url).send().await?.text().await?;
//!         parse_listing(&body)
//!     }
//! }
//! ```

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::Result;
use crate::types::{Catalog, FetchOptions};

// ============================================================================
// Catalog Fetcher
// ============================================================================

/// Fetches the full model catalog of one provider.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Fetcher name for logging/debugging.
    fn name(&self) -> &str;

    /// Fetch the provider's current catalog.
    ///
    /// Network, HTTP and parse failures are reported as upstream errors
    /// ([`CatalogError::is_upstream`](crate::CatalogError::is_upstream)).
    async fn fetch(&self, options: &FetchOptions) -> Result<Catalog>;
}

// ============================================================================
// Endpoint Fetcher
// ============================================================================

/// Fetches the endpoints (hosting offers) of a single item.
#[async_trait]
pub trait EndpointFetcher: Send + Sync {
    /// Fetcher name for logging/debugging.
    fn name(&self) -> &str;

    /// Fetch every endpoint currently serving `item_id`, keyed by endpoint
    /// tag.
    async fn fetch_endpoints(&self, item_id: &str, options: &FetchOptions) -> Result<Catalog>;
}

// ============================================================================
// Function adapter
// ============================================================================

/// Adapts a plain async function into a [`CatalogFetcher`].
///
/// ```rust
/// # use ratatoskr_catalog::providers::FnFetcher;
/// # use ratatoskr_catalog::{Catalog, ModelRecord};
/// let fetcher = FnFetcher::new("static", |_options| async {
///     Ok(Catalog::new().with("m1", ModelRecord::new(4096)))
/// });
/// ```
pub struct FnFetcher<F, Fut> {
    name: String,
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnFetcher<F, Fut>
where
    F: Fn(FetchOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Catalog>> + Send,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _fut: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> CatalogFetcher for FnFetcher<F, Fut>
where
    F: Fn(FetchOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Catalog>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, options: &FetchOptions) -> Result<Catalog> {
        (self.f)(options.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ModelRecord, Provider};

    #[tokio::test]
    async fn fn_fetcher_passes_options_through() {
        let fetcher = FnFetcher::new("echo", |options: FetchOptions| async move {
            let id = options.base_url.unwrap_or_default();
            Ok(Catalog::new().with(id, ModelRecord::new(1)))
        });

        let options = FetchOptions::new(Provider::Ollama).base_url("http://gpu-box");
        let catalog = fetcher.fetch(&options).await.unwrap();

        assert_eq!(fetcher.name(), "echo");
        assert!(catalog.contains("http://gpu-box"));
    }
}
