//! Catalog fetch strategies.
//!
//! The cache talks to providers only through [`CatalogFetcher`] and
//! [`EndpointFetcher`], looked up in a [`FetcherRegistry`]. One reference
//! implementation for OpenRouter-shaped APIs ships with the crate; other
//! providers plug in by registering their own fetchers.

#[cfg(feature = "openrouter")]
pub mod openrouter;
pub mod registry;
pub mod traits;

#[cfg(feature = "openrouter")]
pub use openrouter::OpenRouterFetcher;
pub use registry::FetcherRegistry;
pub use traits::{CatalogFetcher, EndpointFetcher, FnFetcher};
