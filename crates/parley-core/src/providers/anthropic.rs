//! Anthropic Claude provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::{Role, Turn};

use super::types::{LlmProvider, ProviderError};
use super::{ProviderSettings, http_client};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(settings: &ProviderSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    /// Convert turns to Anthropic wire format
    fn to_anthropic_messages(turns: &[Turn]) -> Vec<AnthropicMessage> {
        turns
            .iter()
            .map(|turn| AnthropicMessage {
                role: turn.role.to_string(),
                content: turn.content.clone(),
            })
            .collect()
    }

    /// Join the text blocks of a response into one assistant turn
    fn from_anthropic_response(resp: AnthropicApiResponse) -> Result<Turn, ProviderError> {
        let text: Vec<String> = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicBlock::Text { text } => Some(text),
                AnthropicBlock::Other => None,
            })
            .collect();

        if text.is_empty() {
            return Err(ProviderError::new(format!(
                "Anthropic response had no text content (stop_reason={:?})",
                resp.stop_reason
            )));
        }

        Ok(Turn {
            role: Role::Assistant,
            content: text.join("\n"),
        })
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, turns: &[Turn]) -> Result<Turn, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: Self::to_anthropic_messages(turns),
        };

        debug!(
            "Anthropic request: model={}, messages={}",
            self.model,
            body.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport("Anthropic", &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::http("Anthropic", status.as_u16(), &error_text));
        }

        let api_response: AnthropicApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport("Anthropic", &e))?;

        debug!(
            "Anthropic response: blocks={}, stop_reason={:?}",
            api_response.content.len(),
            api_response.stop_reason
        );

        Self::from_anthropic_response(api_response)
    }
}

// ── Anthropic wire types ──

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicApiResponse {
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
}
