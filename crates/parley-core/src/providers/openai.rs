//! OpenAI chat-completions provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::{Role, Turn};

use super::types::{LlmProvider, ProviderError};
use super::{ProviderSettings, http_client};

/// OpenAI provider
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
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

    /// Convert turns to OpenAI wire format
    fn to_openai_messages(turns: &[Turn]) -> Vec<OpenAiMessage> {
        turns
            .iter()
            .map(|turn| OpenAiMessage {
                role: turn.role.to_string(),
                content: turn.content.clone(),
            })
            .collect()
    }

    /// Pull the assistant text out of an OpenAI response
    fn from_openai_response(resp: OpenAiApiResponse) -> Result<Turn, ProviderError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::new("OpenAI response had no choices"))?;

        Ok(Turn {
            role: Role::Assistant,
            content: choice.message.content.unwrap_or_default(),
        })
    }

    /// Send one chat-completions request, labelling errors with `label`
    pub(crate) async fn send(&self, label: &str, turns: &[Turn]) -> Result<Turn, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = OpenAiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: Self::to_openai_messages(turns),
        };

        debug!(
            "{} request: model={}, messages={}",
            label,
            self.model,
            body.messages.len()
        );

        let mut request = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(label, &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::http(label, status.as_u16(), &error_text));
        }

        let api_response: OpenAiApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(label, &e))?;

        debug!(
            "{} response: choices={}, finish_reason={:?}",
            label,
            api_response.choices.len(),
            api_response.choices.first().map(|c| &c.finish_reason)
        );

        Self::from_openai_response(api_response)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, turns: &[Turn]) -> Result<Turn, ProviderError> {
        self.send("OpenAI", turns).await
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<OpenAiMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiApiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}
