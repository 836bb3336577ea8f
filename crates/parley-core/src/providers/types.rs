//! Provider-agnostic types shared by every backend client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::Turn;

/// Raw failure reported by a provider client.
///
/// Only the message and the HTTP status (when there was one) survive; the
/// classifier works from these two fields alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Non-success HTTP response
    pub fn http(provider: &str, status: u16, body: &str) -> Self {
        Self {
            message: format!(
                "{} API request failed with status {}: {}",
                provider, status, body
            ),
            status: Some(status),
        }
    }

    /// Failure below HTTP: connect, timeout, body decode
    pub fn transport(provider: &str, err: &reqwest::Error) -> Self {
        let what = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection failed"
        } else if err.is_decode() {
            "failed to decode response"
        } else {
            "failed to send request"
        };
        Self {
            message: format!("{} {}: {}", provider, what, err),
            status: err.status().map(|s| s.as_u16()),
        }
    }
}

/// Backend families a provider entry can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    #[serde(alias = "claude")]
    Anthropic,
    #[serde(alias = "gemini")]
    Google,
    Groq,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::Google,
        Self::Groq,
        Self::Ollama,
    ];

    /// Ollama runs locally and takes no key
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::Google => "gemini-1.5-flash",
            Self::Groq => "llama-3.1-8b-instant",
            Self::Ollama => "llama3.2",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Google => "https://generativelanguage.googleapis.com",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::Google => write!(f, "google"),
            Self::Groq => write!(f, "groq"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Trait that all completion backends implement
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend family label (e.g. "openai", "groq")
    fn provider_name(&self) -> &str;

    /// Model identifier (e.g. "gpt-4o-mini")
    fn model(&self) -> &str;

    /// Produce the next assistant turn for the given history
    async fn complete(&self, turns: &[Turn]) -> Result<Turn, ProviderError>;
}
