//! Router provider identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// A router provider whose model catalog can be cached.
///
/// Serializes to (and parses from) its kebab-case wire name, e.g.
/// `"vercel-ai-gateway"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    #[serde(rename = "openrouter")]
    OpenRouter,
    Requesty,
    Glama,
    Unbound,
    #[serde(rename = "litellm")]
    LiteLlm,
    Ollama,
    #[serde(rename = "lmstudio")]
    LmStudio,
    #[serde(rename = "deepinfra")]
    DeepInfra,
    VercelAiGateway,
    #[serde(rename = "huggingface")]
    HuggingFace,
    IoIntelligence,
    Chutes,
}

impl Provider {
    /// Every known provider, in declaration order.
    pub const ALL: &'static [Provider] = &[
        Provider::OpenRouter,
        Provider::Requesty,
        Provider::Glama,
        Provider::Unbound,
        Provider::LiteLlm,
        Provider::Ollama,
        Provider::LmStudio,
        Provider::DeepInfra,
        Provider::VercelAiGateway,
        Provider::HuggingFace,
        Provider::IoIntelligence,
        Provider::Chutes,
    ];

    /// Wire name of the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Requesty => "requesty",
            Self::Glama => "glama",
            Self::Unbound => "unbound",
            Self::LiteLlm => "litellm",
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
            Self::DeepInfra => "deepinfra",
            Self::VercelAiGateway => "vercel-ai-gateway",
            Self::HuggingFace => "huggingface",
            Self::IoIntelligence => "io-intelligence",
            Self::Chutes => "chutes",
        }
    }

    /// Whether the provider can run as several independently configured
    /// instances, told apart by their base URL.
    pub fn supports_base_url(&self) -> bool {
        matches!(
            self,
            Self::LiteLlm | Self::Ollama | Self::LmStudio | Self::Requesty | Self::DeepInfra
        )
    }

    /// Whether the provider lists its models without credentials.
    pub fn is_public(&self) -> bool {
        matches!(self, Self::OpenRouter | Self::Glama | Self::VercelAiGateway)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CatalogError::UnknownProvider(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_provider() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), *provider);
        }
    }

    #[test]
    fn parse_unknown_is_unknown_provider() {
        let err = "nope".parse::<Provider>().unwrap_err();
        assert!(matches!(err, CatalogError::UnknownProvider(ref name) if name == "nope"));
    }

    #[test]
    fn serde_uses_wire_name() {
        let json = serde_json::to_string(&Provider::VercelAiGateway).unwrap();
        assert_eq!(json, "\"vercel-ai-gateway\"");
        let back: Provider = serde_json::from_str("\"lmstudio\"").unwrap();
        assert_eq!(back, Provider::LmStudio);
    }

    #[test]
    fn public_providers_need_no_base_url() {
        for provider in Provider::ALL.iter().filter(|p| p.is_public()) {
            assert!(!provider.supports_base_url());
        }
    }
}
