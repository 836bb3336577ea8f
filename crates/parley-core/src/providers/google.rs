//! Google Gemini provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conversation::{Role, Turn};

use super::types::{LlmProvider, ProviderError};
use super::{ProviderSettings, http_client};

/// Google Gemini provider
pub struct GoogleProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl std::fmt::Debug for GoogleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl GoogleProvider {
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

    /// Convert turns to Gemini wire format. Gemini calls the assistant "model".
    fn to_gemini_contents(turns: &[Turn]) -> Vec<GeminiContent> {
        turns
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                GeminiContent {
                    role: role.to_string(),
                    parts: vec![GeminiPart {
                        text: Some(turn.content.clone()),
                    }],
                }
            })
            .collect()
    }

    /// Convert Gemini response to an assistant turn
    fn from_gemini_response(resp: GeminiApiResponse) -> Result<Turn, ProviderError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::new("Gemini response had no candidates"))?;

        let text: Vec<String> = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::new(format!(
                "Gemini response had no text (finishReason={:?})",
                candidate.finish_reason
            )));
        }

        Ok(Turn {
            role: Role::Assistant,
            content: text.concat(),
        })
    }
}

#[async_trait]
impl LlmProvider for GoogleProvider {
    fn provider_name(&self) -> &str {
        "google"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, turns: &[Turn]) -> Result<Turn, ProviderError> {
        // Key goes in a header so it never shows up in a reqwest error's URL
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GeminiRequest {
            contents: Self::to_gemini_contents(turns),
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.max_tokens,
                temperature: self.temperature,
            },
        };

        debug!(
            "Gemini request: model={}, contents={}",
            self.model,
            body.contents.len()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport("Gemini", &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::http("Gemini", status.as_u16(), &error_text));
        }

        let api_response: GeminiApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport("Gemini", &e))?;

        debug!(
            "Gemini response: candidates={}",
            api_response.candidates.len()
        );

        Self::from_gemini_response(api_response)
    }
}

// ── Gemini wire types ──

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderKind;

    #[test]
    fn test_to_gemini_contents_assistant_is_model() {
        let turns = vec![Turn::user("hello"), Turn::assistant("hi")];
        let result = GoogleProvider::to_gemini_contents(&turns);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].role, "user");
        assert_eq!(result[1].role, "model");
        assert_eq!(result[1].parts[0].text.as_deref(), Some("hi"));
    }

    #[test]
    fn test_request_wire_shape() {
        let body = GeminiRequest {
            contents: GoogleProvider::to_gemini_contents(&[Turn::user("q")]),
            generation_config: GeminiGenerationConfig {
                max_output_tokens: 256,
                temperature: Some(0.5),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(json["contents"][0]["parts"][0]["text"], "q");
    }

    #[test]
    fn test_from_gemini_response_text() {
        let resp: GeminiApiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hel"}, {"text": "lo!"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5}
        }))
        .unwrap();
        let turn = GoogleProvider::from_gemini_response(resp).unwrap();
        assert_eq!(turn, Turn::assistant("Hello!"));
    }

    #[test]
    fn test_from_gemini_response_blocked() {
        let resp: GeminiApiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        let err = GoogleProvider::from_gemini_response(resp).unwrap_err();
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn test_from_gemini_response_no_candidates() {
        let resp = GeminiApiResponse { candidates: vec![] };
        assert!(GoogleProvider::from_gemini_response(resp).is_err());
    }

    #[test]
    fn test_google_provider_debug_hides_key() {
        let mut settings = ProviderSettings::for_kind(ProviderKind::Google);
        settings.api_key = "AIza-secret".to_string();
        let provider = GoogleProvider::new(&settings).unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("AIza-secret"));
    }
}
