//! Catalog item metadata.

use serde::{Deserialize, Serialize};

use crate::{CatalogError, Result};

/// Metadata for one model offered by a provider.
///
/// The well-known fields are typed; anything else a provider reports is kept
/// verbatim in `extra` so it survives a disk round-trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Maximum context window in tokens. Must be non-zero.
    pub context_window: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default)]
    pub supports_images: bool,
    #[serde(default)]
    pub supports_prompt_cache: bool,
    /// USD per million input tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_price: Option<f64>,
    /// USD per million output tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_writes_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_reads_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Provider-specific fields, kept opaque.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ModelRecord {
    /// Create a record with only the required field set.
    pub fn new(context_window: u64) -> Self {
        Self {
            context_window,
            max_tokens: None,
            supports_images: false,
            supports_prompt_cache: false,
            input_price: None,
            output_price: None,
            cache_writes_price: None,
            cache_reads_price: None,
            description: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_max_tokens(mut self, max: u64) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_images(mut self, supported: bool) -> Self {
        self.supports_images = supported;
        self
    }

    pub fn with_prompt_cache(mut self, supported: bool) -> Self {
        self.supports_prompt_cache = supported;
        self
    }

    /// Set input/output prices (USD per million tokens).
    pub fn with_pricing(mut self, input: f64, output: f64) -> Self {
        self.input_price = Some(input);
        self.output_price = Some(output);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Structural check applied to everything read from disk or upstream.
    pub fn validate(&self) -> Result<()> {
        if self.context_window == 0 {
            return Err(CatalogError::Validation(
                "context_window must be greater than zero".to_string(),
            ));
        }
        let prices = [
            ("input_price", self.input_price),
            ("output_price", self.output_price),
            ("cache_writes_price", self.cache_writes_price),
            ("cache_reads_price", self.cache_reads_price),
        ];
        for (name, price) in prices {
            if let Some(p) = price
                && (!p.is_finite() || p < 0.0)
            {
                return Err(CatalogError::Validation(format!(
                    "{name} must be a non-negative number, got {p}"
                )));
            }
        }
        Ok(())
    }
}
