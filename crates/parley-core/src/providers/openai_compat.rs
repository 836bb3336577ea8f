//! OpenAI-compatible provider for Groq, Ollama and similar endpoints.
//!
//! Reuses the OpenAI wire format with a configurable base URL.

use async_trait::async_trait;

use crate::conversation::Turn;

use super::ProviderSettings;
use super::openai::OpenAiProvider;
use super::types::{LlmProvider, ProviderError};

/// OpenAI-compatible provider: wraps [`OpenAiProvider`] with a custom name
pub struct OpenAiCompatProvider {
    inner: OpenAiProvider,
    name: String,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .finish()
    }
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// - `name`: label used in logs and error messages (e.g. "groq", "ollama")
    /// - `settings.base_url`: endpoint root (e.g. `http://localhost:11434/v1`)
    pub fn new(name: impl Into<String>, settings: &ProviderSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            inner: OpenAiProvider::new(settings)?,
            name: name.into(),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, turns: &[Turn]) -> Result<Turn, ProviderError> {
        self.inner.send(&self.name, turns).await
    }
}
