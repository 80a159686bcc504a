//! Ratatoskr Catalog - always-available cache of router model catalogs
//!
//! This crate keeps a local copy of what models and endpoints each upstream
//! router currently offers. Catalogs are fetched through pluggable
//! per-provider strategies, validated, reconciled with the previous snapshot
//! when a fetch looks truncated, and stored in a two-tier cache (memory over
//! per-key JSON files). Once a catalog has been fetched successfully, network
//! failures degrade to the last known-good snapshot instead of to nothing.
//!
//! # Example
//!
//! ```rust,no_run
//! use ratatoskr_catalog::{Catalogs, FetchOptions, Provider, WarmupConfig};
//!
//! #[tokio::main]
//! async fn main() -> ratatoskr_catalog::Result<()> {
//!     let catalogs = Catalogs::builder()
//!         .openrouter()
//!         .min_entries(Provider::OpenRouter, 50)
//!         .build()?;
//!
//!     catalogs.spawn_warmup(WarmupConfig::default());
//!
//!     let models = catalogs
//!         .catalog
//!         .get_catalog(&FetchOptions::new(Provider::OpenRouter))
//!         .await?;
//!     for (id, record) in &models {
//!         println!("{id}: {} tokens", record.context_window);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Custom fetchers
//!
//! ```rust
//! use std::sync::Arc;
//! use ratatoskr_catalog::{Catalog, Catalogs, FnFetcher, ModelRecord, Provider};
//!
//! let catalogs = Catalogs::builder()
//!     .fetcher(
//!         Provider::Glama,
//!         Arc::new(FnFetcher::new("glama", |_options| async {
//!             Ok(Catalog::new().with("glama/model", ModelRecord::new(8192)))
//!         })),
//!     )
//!     .build()
//!     .unwrap();
//! assert!(catalogs.catalog.fetchers().has(Provider::Glama));
//! ```

pub mod builder;
pub mod cache;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod providers;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use builder::{CatalogCacheBuilder, Catalogs};
pub use cache::{
    AcceptAll, CatalogAggregator, CatalogCache, CatalogCacheConfig, EndpointCache, EntryStore,
    FlushMode, Freshness, FreshnessValidator, MinEntries, Preserve, RequirePinned, StoreKind, Tier,
    WarmupConfig, WarmupScheduler, reconcile,
};
pub use error::{CatalogError, Result};
pub use providers::{CatalogFetcher, EndpointFetcher, FetcherRegistry, FnFetcher};

#[cfg(feature = "openrouter")]
pub use providers::OpenRouterFetcher;

// Re-export all types
pub use types::{
    AggregateResult, Catalog, CatalogKey, EndpointKey, FetchOptions, ModelRecord, Provider,
    ProviderFailure,
};
