use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, decode_json, ensure_prompt, map_send_error, require_text};
use super::{AiProvider, ProviderConfig, ProviderKind};
use crate::{ProviderError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct ClaudeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ClaudeMessage<'a>>,
}

#[derive(Serialize)]
struct ClaudeMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Option<Vec<ClaudeContent>>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: Option<String>,
}

/// Claude/Anthropic messages API provider
pub struct ClaudeApiProvider {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ClaudeApiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout)?,
            url: format!("{}/v1/messages", config.base_url()?),
            api_key: config.api_key.expose().to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl AiProvider for ClaudeApiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        ensure_prompt(prompt)?;

        let request = ClaudeRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![ClaudeMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(map_send_error)?;

        let claude_response: ClaudeResponse = decode_json(response, "anthropic").await?;

        // Join text blocks; other block types (thinking, tool use) carry no answer
        let text: Vec<String> = claude_response
            .content
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| c.text)
            .collect();
        let text = if text.is_empty() { None } else { Some(text.join("\n")) };

        require_text(text, "anthropic")
    }
}
