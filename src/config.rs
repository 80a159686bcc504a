//! Configuration loading for rat-catalog.
//!
//! Configuration is loaded from TOML with the following resolution order:
//! 1. `--config <path>` (CLI flag; must exist)
//! 2. `~/.ratatoskr/catalog.toml` (user)
//! 3. `/etc/ratatoskr/catalog.toml` (system)
//! 4. built-in defaults
//!
//! API keys never live in this file; they are read from the provider's
//! environment variable (e.g. `OPENROUTER_API_KEY`).
//!
//! ```toml
//! [cache]
//! dir = "/var/cache/ratatoskr/catalog"
//! fetch_timeout_secs = 30
//!
//! [warmup]
//! providers = ["openrouter"]
//!
//! [providers.openrouter]
//! min_entries = 50
//!
//! [providers.litellm]
//! base_url = "http://localhost:4000/v1"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::builder::CatalogCacheBuilder;
use crate::cache::{CatalogCacheConfig, DEFAULT_FETCH_TIMEOUT, WarmupConfig};
use crate::cache::store::{DEFAULT_MAX_ENTRIES, DEFAULT_RESIDENCY};
use crate::cache::warmup::{DEFAULT_INITIAL_DELAY, DEFAULT_INTER_DELAY};
use crate::types::{FetchOptions, Provider};
use crate::{CatalogError, Result};

/// rat-catalog configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub warmup: WarmupSection,
    /// Per-provider settings, keyed by provider name.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderSection>,
}

/// Cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Durable tier directory (default: `~/.cache/ratatoskr/catalog`).
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Bound on each upstream fetch in seconds (default: 30).
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Fast-tier residency in seconds (default: 300).
    #[serde(default = "default_residency")]
    pub residency_secs: u64,
    /// Fast-tier capacity (default: 1000).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: None,
            fetch_timeout_secs: default_fetch_timeout(),
            residency_secs: default_residency(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT.as_secs()
}

fn default_residency() -> u64 {
    DEFAULT_RESIDENCY.as_secs()
}

fn default_max_entries() -> u64 {
    DEFAULT_MAX_ENTRIES
}

/// Warmup settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WarmupSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Delay before the first refresh in milliseconds (default: 2000).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Pause between refreshes in milliseconds (default: 500).
    #[serde(default = "default_inter_delay")]
    pub inter_delay_ms: u64,
    /// Providers to warm (default: every credential-free provider).
    #[serde(default)]
    pub providers: Option<Vec<String>>,
}

impl Default for WarmupSection {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: default_initial_delay(),
            inter_delay_ms: default_inter_delay(),
            providers: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_initial_delay() -> u64 {
    DEFAULT_INITIAL_DELAY.as_millis() as u64
}

fn default_inter_delay() -> u64 {
    DEFAULT_INTER_DELAY.as_millis() as u64
}

/// Settings for one provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSection {
    /// Base URL of an OpenRouter-compatible listing API. Also selects the
    /// cache key for providers that run as several instances.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Fetches with fewer entries are treated as suspicious.
    #[serde(default)]
    pub min_entries: Option<usize>,
}

/// Provider → environment variable holding its API key.
const PROVIDER_ENV_VARS: &[(Provider, &str)] = &[
    (Provider::OpenRouter, "OPENROUTER_API_KEY"),
    (Provider::Requesty, "REQUESTY_API_KEY"),
    (Provider::Glama, "GLAMA_API_KEY"),
    (Provider::Unbound, "UNBOUND_API_KEY"),
    (Provider::LiteLlm, "LITELLM_API_KEY"),
    (Provider::DeepInfra, "DEEPINFRA_API_KEY"),
    (Provider::VercelAiGateway, "VERCEL_AI_GATEWAY_API_KEY"),
    (Provider::HuggingFace, "HF_API_KEY"),
    (Provider::IoIntelligence, "IO_INTELLIGENCE_API_KEY"),
    (Provider::Chutes, "CHUTES_API_KEY"),
];

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist; otherwise the first existing standard
    /// location is used, falling back to defaults when there is none.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CatalogError::Configuration(format!("Failed to parse config: {e}")))
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CatalogError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            CatalogError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(CatalogError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".ratatoskr").join("catalog.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/ratatoskr/catalog.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Cache configuration described by the `[cache]` section.
    pub fn cache_config(&self) -> CatalogCacheConfig {
        let mut config = CatalogCacheConfig::new()
            .fetch_timeout(Duration::from_secs(self.cache.fetch_timeout_secs))
            .residency(Duration::from_secs(self.cache.residency_secs))
            .max_entries(self.cache.max_entries);
        if let Some(dir) = &self.cache.dir {
            config = config.cache_dir(dir);
        }
        config
    }

    /// Warmup schedule, or `None` when warmup is disabled.
    pub fn warmup_config(&self) -> Result<Option<WarmupConfig>> {
        if !self.warmup.enabled {
            return Ok(None);
        }
        let mut config = WarmupConfig::new()
            .initial_delay(Duration::from_millis(self.warmup.initial_delay_ms))
            .inter_delay(Duration::from_millis(self.warmup.inter_delay_ms));
        if let Some(names) = &self.warmup.providers {
            let providers = names
                .iter()
                .map(|name| parse_provider(name))
                .collect::<Result<Vec<_>>>()?;
            config = config.providers(providers);
        }
        Ok(Some(config))
    }

    /// The `[providers.*]` sections with their names resolved.
    pub fn providers(&self) -> Result<Vec<(Provider, &ProviderSection)>> {
        self.providers
            .iter()
            .map(|(name, section)| Ok((parse_provider(name)?, section)))
            .collect()
    }

    /// Builder carrying every setting in this config.
    ///
    /// OpenRouter is always registered; any provider with a `base_url` is
    /// registered as OpenRouter-compatible at that URL.
    pub fn builder(&self) -> Result<CatalogCacheBuilder> {
        let mut builder = CatalogCacheBuilder::new().config(self.cache_config());

        #[cfg(feature = "openrouter")]
        {
            builder = builder.openrouter();
        }

        for (provider, section) in self.providers()? {
            #[cfg(feature = "openrouter")]
            if let Some(url) = section.base_url.as_deref() {
                builder = builder.openrouter_compatible(provider, Some(url));
            }
            if let Some(min) = section.min_entries {
                builder = builder.min_entries(provider, min);
            }
        }
        Ok(builder)
    }

    /// Fetch options for `provider`: configured base URL plus the API key
    /// from the environment.
    pub fn fetch_options(&self, provider: Provider) -> FetchOptions {
        let mut options = FetchOptions::new(provider);
        if let Some(url) = self
            .providers
            .get(provider.as_str())
            .and_then(|s| s.base_url.as_ref())
        {
            options = options.base_url(url);
        }
        if let Some(key) = api_key(provider) {
            options = options.api_key(key);
        }
        options
    }
}

fn parse_provider(name: &str) -> Result<Provider> {
    name.parse()
        .map_err(|_| CatalogError::Configuration(format!("unknown provider in config: {name}")))
}

/// API key for `provider` from its environment variable.
pub fn api_key(provider: Provider) -> Option<String> {
    PROVIDER_ENV_VARS
        .iter()
        .find(|(p, _)| *p == provider)
        .and_then(|(_, env_var)| std::env::var(env_var).ok())
        .filter(|key| !key.is_empty())
}
