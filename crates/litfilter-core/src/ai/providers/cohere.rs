use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, decode_json, ensure_prompt, map_send_error, require_text};
use super::{AiProvider, ProviderConfig, ProviderKind};
use crate::{ProviderError, Result};

#[derive(Serialize)]
struct CohereRequest<'a> {
    model: &'a str,
    message: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CohereResponse {
    text: Option<String>,
}

/// Cohere chat API provider
pub struct CohereProvider {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl CohereProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            url: format!("{}/v1/chat", config.base_url()?),
            api_key: config.api_key.expose().to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl AiProvider for CohereProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cohere
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        ensure_prompt(prompt)?;

        let request = CohereRequest {
            model: &self.model,
            message: prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let parsed: CohereResponse = decode_json(response, "cohere").await?;
        require_text(parsed.text, "cohere")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::providers::ApiKey;

    #[test]
    fn test_chat_url_and_body() {
        let cfg = ProviderConfig::new(ProviderKind::Cohere, "command-r", ApiKey::new("co-0000000000"));
        let provider = CohereProvider::new(&cfg).unwrap();
        assert_eq!(provider.url, "https://api.cohere.ai/v1/chat");

        let body = serde_json::to_value(CohereRequest {
            model: "command-r",
            message: "Rate this",
            temperature: 0.0,
            max_tokens: 16,
        })
        .unwrap();
        assert_eq!(body["message"], "Rate this");
    }

    #[test]
    fn test_response_parsing() {
        let parsed: CohereResponse = serde_json::from_str(r#"{"response_id":"1","text":"0.55"}"#).unwrap();
        assert_eq!(parsed.text.as_deref(), Some("0.55"));
    }
}
