//! Public types for the catalog cache API.

mod aggregate;
mod catalog;
mod key;
mod model;
mod options;
mod provider;

pub use aggregate::{AggregateResult, ProviderFailure};
pub use catalog::Catalog;
pub use key::{CatalogKey, EndpointKey};
pub use model::ModelRecord;
pub use options::FetchOptions;
pub use provider::Provider;
