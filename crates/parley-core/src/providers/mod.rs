//! Multi-provider completion layer
//!
//! Supports OpenAI, Anthropic, Google Gemini, and the OpenAI-compatible
//! endpoints of Groq and Ollama. Every client implements [`LlmProvider`];
//! [`build_provider`] resolves a [`ProviderKind`] to its client so the rest of
//! the crate never inspects concrete types.

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod openai_compat;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

pub use types::{LlmProvider, ProviderError, ProviderKind};

use anthropic::AnthropicProvider;
use google::GoogleProvider;
use openai::OpenAiProvider;
use openai_compat::OpenAiCompatProvider;

const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything a client needs to talk to its backend
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &if self.api_key.is_empty() { "(empty)" } else { "***" })
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ProviderSettings {
    /// Defaults for a backend family, with no API key
    pub fn for_kind(kind: ProviderKind) -> Self {
        Self {
            api_key: String::new(),
            model: kind.default_model().to_string(),
            base_url: kind.default_base_url().to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::new(format!("Failed to build HTTP client: {}", e)))
}

/// Build the client for `kind`
pub fn build_provider(
    kind: ProviderKind,
    settings: &ProviderSettings,
) -> Result<Arc<dyn LlmProvider>, ProviderError> {
    let provider: Arc<dyn LlmProvider> = match kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(settings)?),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(settings)?),
        ProviderKind::Google => Arc::new(GoogleProvider::new(settings)?),
        ProviderKind::Groq => Arc::new(OpenAiCompatProvider::new("groq", settings)?),
        ProviderKind::Ollama => Arc::new(OpenAiCompatProvider::new("ollama", settings)?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_provider_every_kind() {
        for kind in ProviderKind::ALL {
            let provider = build_provider(kind, &ProviderSettings::for_kind(kind)).unwrap();
            assert_eq!(provider.provider_name(), kind.to_string());
            assert_eq!(provider.model(), kind.default_model());
        }
    }

    #[test]
    fn test_settings_debug_masks_key() {
        let mut settings = ProviderSettings::for_kind(ProviderKind::OpenAi);
        settings.api_key = "sk-very-secret".to_string();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("***"));
    }
}
