//! Caching subsystem.
//!
//! Layers, leaves first:
//!
//! - [`store::EntryStore`]: two-tier store (moka fast tier over per-key
//!   JSON files). Nothing above it knows about files or memory.
//!
//! - [`freshness`]: validators that flag implausible fetches, and the
//!   reconciler that merges them with the previous snapshot.
//!
//! - [`CatalogCache`]: read-through orchestrator for whole provider
//!   catalogs (`get_catalog` / `refresh_catalog` / `flush_catalog`).
//!
//! - [`EndpointCache`]: per-item endpoint lists with request coalescing and
//!   stale-while-revalidate.
//!
//! - [`CatalogAggregator`]: fans one request out to several providers and
//!   isolates their failures.
//!
//! - [`WarmupScheduler`]: delayed, rate-limited priming of public providers.

pub mod aggregate;
pub mod catalog;
pub mod endpoint;
pub mod freshness;
pub mod store;
pub mod warmup;

pub use aggregate::CatalogAggregator;
pub use catalog::{CatalogCache, CatalogCacheConfig, DEFAULT_FETCH_TIMEOUT, FlushMode, default_cache_dir};
pub use endpoint::EndpointCache;
pub use freshness::{
    AcceptAll, Freshness, FreshnessValidator, MinEntries, Preserve, RequirePinned, reconcile,
};
pub use store::{EntryStore, StoreKind, Tier};
pub use warmup::{WarmupConfig, WarmupScheduler};
