//! Cache keys.
//!
//! A [`CatalogKey`] names one cached provider catalog and doubles as the
//! stem of its durable file, so it must be stable across processes. Keys for
//! self-hosted providers carry a short SHA-256 prefix of the base URL: two
//! LiteLLM instances at different URLs never share a catalog.

use std::fmt;

use sha2::{Digest, Sha256};

use super::{FetchOptions, Provider};

/// Hex characters of the digest appended to a key (base URL or item id).
const URL_HASH_LEN: usize = 8;

/// Identifies one cached provider catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CatalogKey {
    provider: Provider,
    rendered: String,
}

impl CatalogKey {
    /// Key for a provider's default (single) instance.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            rendered: provider.as_str().to_string(),
        }
    }

    /// Key for a provider instance reached at `base_url`.
    ///
    /// The URL only contributes when the provider supports multiple
    /// instances; for everything else this is the same as [`CatalogKey::new`].
    pub fn with_base_url(provider: Provider, base_url: Option<&str>) -> Self {
        match base_url {
            Some(url) if provider.supports_base_url() && !url.is_empty() => Self {
                provider,
                rendered: format!("{}_{}", provider.as_str(), short_hash(url)),
            },
            _ => Self::new(provider),
        }
    }

    pub fn from_options(options: &FetchOptions) -> Self {
        Self::with_base_url(options.provider, options.base_url.as_deref())
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Identifies the cached endpoint list for one item offered by one provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub provider: Provider,
    pub item_id: String,
}

impl EndpointKey {
    pub fn new(provider: Provider, item_id: impl Into<String>) -> Self {
        Self {
            provider,
            item_id: item_id.into(),
        }
    }

    /// File-safe rendering: `{provider}_{item id}_{hash}`. Path separators
    /// and colons in the readable part become underscores; the hash of the
    /// raw item id keeps ids that sanitize alike apart.
    pub fn file_stem(&self) -> String {
        let item: String = self
            .item_id
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c => c,
            })
            .collect();
        format!(
            "{}_{item}_{}",
            self.provider.as_str(),
            short_hash(&self.item_id)
        )
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.item_id)
    }
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(URL_HASH_LEN);
    hex
}
