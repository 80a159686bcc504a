//! OpenRouter catalog and endpoint fetcher.
//!
//! Handles the `/models` and `/models/{id}/endpoints` responses from the
//! OpenRouter API and converts them into [`Catalog`]s. Any router exposing
//! the same response shape can reuse this fetcher via
//! [`OpenRouterFetcher::with_base_url`], or per call through
//! the `base_url` of its [`FetchOptions`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::traits::{CatalogFetcher, EndpointFetcher};
use crate::types::{Catalog, FetchOptions, ModelRecord};
use crate::{CatalogError, Result};

/// Default base URL for the OpenRouter API.
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Per-request HTTP timeout. The cache applies its own, usually shorter,
/// bound around every fetch.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetcher for OpenRouter-shaped model listings.
#[derive(Clone)]
pub struct OpenRouterFetcher {
    http: Client,
    base_url: String,
}

impl OpenRouterFetcher {
    /// Create a fetcher against the public OpenRouter API.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a fetcher with a custom default base URL. A `base_url` in the
    /// [`FetchOptions`] of a call still takes precedence.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL for a request: the caller's instance when given, else the
    /// one this fetcher was built with.
    fn base_url<'a>(&'a self, options: &'a FetchOptions) -> &'a str {
        match options.base_url.as_deref() {
            Some(url) if !url.is_empty() => url.trim_end_matches('/'),
            _ => &self.base_url,
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, options: &FetchOptions) -> Result<T> {
        let mut request = self.http.get(url);
        if let Some(key) = &options.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: format!("OpenRouter API error: {status}"),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| CatalogError::Parse(e.to_string()))
    }
}

impl Default for OpenRouterFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogFetcher for OpenRouterFetcher {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn fetch(&self, options: &FetchOptions) -> Result<Catalog> {
        let url = format!("{}/models", self.base_url(options));
        let response: ModelsResponse = self.get(&url, options).await?;
        Ok(models_into_catalog(response.data))
    }
}

#[async_trait]
impl EndpointFetcher for OpenRouterFetcher {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn fetch_endpoints(&self, item_id: &str, options: &FetchOptions) -> Result<Catalog> {
        let url = format!("{}/models/{item_id}/endpoints", self.base_url(options));
        let response: EndpointsResponse = self.get(&url, options).await?;
        Ok(endpoints_into_catalog(response.data.endpoints))
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// `/models` list response.
#[derive(Debug, Deserialize)]
pub(crate) struct ModelsResponse {
    pub data: Vec<ModelEntry>,
}

/// A single model entry from the OpenRouter API.
#[derive(Debug, Deserialize)]
pub(crate) struct ModelEntry {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub pricing: Option<PricingEntry>,
    #[serde(default)]
    pub top_provider: Option<TopProvider>,
    #[serde(default)]
    pub architecture: Option<Architecture>,
}

/// `/models/{id}/endpoints` response.
#[derive(Debug, Deserialize)]
pub(crate) struct EndpointsResponse {
    pub data: EndpointsData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EndpointsData {
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
}

/// One hosting offer for a model.
#[derive(Debug, Deserialize)]
pub(crate) struct EndpointEntry {
    #[serde(default)]
    pub tag: Option<String>,
    pub provider_name: String,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub max_completion_tokens: Option<u64>,
    #[serde(default)]
    pub pricing: Option<PricingEntry>,
}

/// Pricing from the OpenRouter API (string-encoded decimals, cost per token).
#[derive(Debug, Deserialize)]
pub(crate) struct PricingEntry {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub completion: Option<String>,
    #[serde(default)]
    pub input_cache_write: Option<String>,
    #[serde(default)]
    pub input_cache_read: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopProvider {
    #[serde(default)]
    pub max_completion_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Architecture {
    #[serde(default)]
    pub input_modalities: Vec<String>,
}

// ============================================================================
// Conversion
// ============================================================================

/// Convert a `/models` listing. Entries without a usable context length are
/// dropped, since they would never pass validation.
pub(crate) fn models_into_catalog(entries: Vec<ModelEntry>) -> Catalog {
    entries
        .into_iter()
        .filter_map(|entry| {
            let id = entry.id.clone();
            match into_model_record(entry) {
                Some(record) => Some((id, record)),
                None => {
                    debug!(model = %id, "skipping model without context length");
                    None
                }
            }
        })
        .collect()
}

pub(crate) fn into_model_record(entry: ModelEntry) -> Option<ModelRecord> {
    let context_window = entry.context_length.filter(|&c| c > 0)?;
    let mut record = ModelRecord::new(context_window);

    record.max_tokens = entry.top_provider.and_then(|tp| tp.max_completion_tokens);
    record.supports_images = entry
        .architecture
        .is_some_and(|a| a.input_modalities.iter().any(|m| m == "image"));
    record.description = entry.description;
    if let Some(pricing) = entry.pricing {
        apply_pricing(&mut record, &pricing);
    }
    Some(record)
}

/// Convert an endpoint listing, keyed by endpoint tag (or provider name for
/// endpoints without a tag).
pub(crate) fn endpoints_into_catalog(endpoints: Vec<EndpointEntry>) -> Catalog {
    endpoints
        .into_iter()
        .filter_map(|endpoint| {
            let context_window = endpoint.context_length.filter(|&c| c > 0)?;
            let id = endpoint
                .tag
                .clone()
                .unwrap_or_else(|| endpoint.provider_name.clone());

            let mut record = ModelRecord::new(context_window);
            record.max_tokens = endpoint.max_completion_tokens;
            record.description = Some(endpoint.provider_name);
            if let Some(pricing) = endpoint.pricing {
                apply_pricing(&mut record, &pricing);
            }
            Some((id, record))
        })
        .collect()
}

fn apply_pricing(record: &mut ModelRecord, pricing: &PricingEntry) {
    record.input_price = parse_per_token_to_per_mtok(pricing.prompt.as_deref());
    record.output_price = parse_per_token_to_per_mtok(pricing.completion.as_deref());
    record.cache_writes_price = parse_per_token_to_per_mtok(pricing.input_cache_write.as_deref());
    record.cache_reads_price = parse_per_token_to_per_mtok(pricing.input_cache_read.as_deref());
    record.supports_prompt_cache = record.cache_reads_price.is_some();
}

/// Parse OpenRouter per-token price string to per-million-token cost.
///
/// OpenRouter prices are decimal strings representing cost per single token
/// (e.g. `"0.000005"` = $5 per million tokens). Negative sentinels (`"-1"`
/// marks variable pricing) are treated as unknown.
fn parse_per_token_to_per_mtok(s: Option<&str>) -> Option<f64> {
    let per_token: f64 = s?.parse().ok()?;
    (per_token >= 0.0).then_some(per_token * 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provider;

    fn sample_entry() -> ModelEntry {
        ModelEntry {
            id: "anthropic/claude-sonnet-4".to_string(),
            description: Some("Claude Sonnet 4".to_string()),
            context_length: Some(200_000),
            pricing: Some(PricingEntry {
                prompt: Some("0.000003".to_string()),
                completion: Some("0.000015".to_string()),
                input_cache_write: Some("0.00000375".to_string()),
                input_cache_read: Some("0.0000003".to_string()),
            }),
            top_provider: Some(TopProvider {
                max_completion_tokens: Some(8192),
            }),
            architecture: Some(Architecture {
                input_modalities: vec!["text".to_string(), "image".to_string()],
            }),
        }
    }

    #[test]
    fn converts_basic_fields() {
        let record = into_model_record(sample_entry()).unwrap();

        assert_eq!(record.context_window, 200_000);
        assert_eq!(record.max_tokens, Some(8192));
        assert!(record.supports_images);
        assert!(record.supports_prompt_cache);
        assert_eq!(record.description.as_deref(), Some("Claude Sonnet 4"));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn converts_pricing_per_token_to_per_mtok() {
        let record = into_model_record(sample_entry()).unwrap();

        assert!((record.input_price.unwrap() - 3.0).abs() < 0.001);
        assert!((record.output_price.unwrap() - 15.0).abs() < 0.001);
        assert!((record.cache_reads_price.unwrap() - 0.3).abs() < 0.001);
    }

    #[test]
    fn drops_models_without_context_length() {
        let mut entry = sample_entry();
        entry.context_length = None;
        let catalog = models_into_catalog(vec![entry]);
        assert!(catalog.is_empty());
    }

    #[test]
    fn endpoints_keyed_by_tag_or_provider() {
        let endpoints = vec![
            EndpointEntry {
                tag: Some("anthropic".to_string()),
                provider_name: "Anthropic".to_string(),
                context_length: Some(200_000),
                max_completion_tokens: Some(64_000),
                pricing: None,
            },
            EndpointEntry {
                tag: None,
                provider_name: "Google Vertex".to_string(),
                context_length: Some(200_000),
                max_completion_tokens: None,
                pricing: None,
            },
        ];
        let catalog = endpoints_into_catalog(endpoints);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("anthropic").unwrap().max_tokens, Some(64_000));
        assert!(catalog.contains("Google Vertex"));
    }

    #[test]
    fn options_base_url_takes_precedence() {
        let fetcher = OpenRouterFetcher::with_base_url("http://default/v1/");
        let plain = FetchOptions::new(Provider::LiteLlm);
        let routed = FetchOptions::new(Provider::LiteLlm).base_url("http://litellm:4000/v1/");
        let blank = FetchOptions::new(Provider::LiteLlm).base_url("");

        assert_eq!(fetcher.base_url(&plain), "http://default/v1");
        assert_eq!(fetcher.base_url(&routed), "http://litellm:4000/v1");
        assert_eq!(fetcher.base_url(&blank), "http://default/v1");
    }

    #[test]
    fn parse_per_token_to_per_mtok_works() {
        assert!((parse_per_token_to_per_mtok(Some("0.000005")).unwrap() - 5.0).abs() < 0.001);
        assert!(parse_per_token_to_per_mtok(None).is_none());
        assert!(parse_per_token_to_per_mtok(Some("invalid")).is_none());
        assert!(parse_per_token_to_per_mtok(Some("-1")).is_none());
    }
}
