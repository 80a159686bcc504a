//! One-shot background warmup for credential-free providers.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::catalog::CatalogCache;
use crate::types::{FetchOptions, Provider};

/// Default delay before the first refresh.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(2);

/// Default pause between consecutive provider refreshes.
pub const DEFAULT_INTER_DELAY: Duration = Duration::from_millis(500);

/// Warmup schedule.
///
/// ```rust
/// # use ratatoskr_catalog::{Provider, WarmupConfig};
/// # use std::time::Duration;
/// let config = WarmupConfig::new()
///     .initial_delay(Duration::ZERO)
///     .providers([Provider::OpenRouter]);
/// assert_eq!(config.providers, vec![Provider::OpenRouter]);
/// ```
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    pub initial_delay: Duration,
    pub inter_delay: Duration,
    /// Providers to refresh, in order. Default: every provider that needs no
    /// credentials.
    pub providers: Vec<Provider>,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            inter_delay: DEFAULT_INTER_DELAY,
            providers: Provider::ALL
                .iter()
                .copied()
                .filter(Provider::is_public)
                .collect(),
        }
    }
}

impl WarmupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn inter_delay(mut self, delay: Duration) -> Self {
        self.inter_delay = delay;
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers = providers.into_iter().collect();
        self
    }
}

/// Primes the catalog cache once, shortly after start.
pub struct WarmupScheduler;

impl WarmupScheduler {
    /// Spawn the warmup task. Dropping the handle detaches it; aborting it
    /// stops any remaining refreshes.
    pub fn spawn(cache: CatalogCache, config: WarmupConfig) -> JoinHandle<()> {
        tokio::spawn(async move { Self::run(&cache, &config).await })
    }

    /// Run the warmup inline.
    pub async fn run(cache: &CatalogCache, config: &WarmupConfig) {
        tokio::time::sleep(config.initial_delay).await;

        for (i, &provider) in config.providers.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(config.inter_delay).await;
            }
            if !cache.fetchers().has(provider) {
                debug!(provider = %provider, "no fetcher registered; skipping warmup");
                continue;
            }
            let catalog = cache.refresh_catalog(&FetchOptions::new(provider)).await;
            debug!(provider = %provider, entries = catalog.len(), "warmed catalog");
        }
    }
}
