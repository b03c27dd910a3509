use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, decode_json, ensure_prompt, map_send_error, require_text};
use super::{AiProvider, ProviderConfig, ProviderKind};
use crate::{ProviderError, Result};

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiResponse {
    fn into_text(self) -> Option<String> {
        let parts: Vec<String> = self
            .candidates?
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(""))
        }
    }
}

/// Google Gemini generateContent provider
pub struct GeminiApiProvider {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiApiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            url: format!("{}/v1beta/models/{}:generateContent", config.base_url()?, config.model),
            api_key: config.api_key.expose().to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl AiProvider for GeminiApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        ensure_prompt(prompt)?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
                temperature: self.temperature,
            },
        };

        // Key goes in a header so it never appears in URLs that get logged
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let gemini_response: GeminiResponse = decode_json(response, "google").await?;
        require_text(gemini_response.into_text(), "google")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::providers::ApiKey;

    #[test]
    fn test_generate_content_url() {
        let cfg = ProviderConfig::new(ProviderKind::Google, "gemini-2.0-flash", ApiKey::new("AIza-000000000"));
        let provider = GeminiApiProvider::new(&cfg).unwrap();
        assert_eq!(
            provider.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert!(!provider.url.contains("AIza"));
    }

    #[test]
    fn test_response_text_extraction() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"Score: "},{"text":"0.9"}],"role":"model"}}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_text().as_deref(), Some("Score: 0.9"));
    }

    #[test]
    fn test_blocked_response_has_no_text() {
        // Safety-blocked candidates come back without content
        let json = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let parsed: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.into_text().is_none());

        let parsed: GeminiResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(parsed.into_text().is_none());
    }
}
