use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, decode_json, ensure_prompt, map_send_error, require_text};
use super::{AiProvider, ProviderConfig, ProviderKind, DEFAULT_AZURE_API_VERSION};
use crate::{ProviderError, Result};

/// Services that speak the OpenAI chat-completions dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFlavor {
    OpenAi,
    DeepSeek,
    Mistral,
    /// Deployment-scoped URL and `api-key` header instead of a bearer token
    Azure,
}

impl ChatFlavor {
    fn kind(&self) -> ProviderKind {
        match self {
            ChatFlavor::OpenAi => ProviderKind::OpenAi,
            ChatFlavor::DeepSeek => ProviderKind::DeepSeek,
            ChatFlavor::Mistral => ProviderKind::Mistral,
            ChatFlavor::Azure => ProviderKind::AzureOpenAi,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions provider (OpenAI, DeepSeek, Mistral, Azure)
pub struct OpenAiProvider {
    client: Client,
    flavor: ChatFlavor,
    url: String,
    api_key: String,
    api_version: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(config: &ProviderConfig, flavor: ChatFlavor) -> Result<Self> {
        let base = config.base_url()?;
        let url = match flavor {
            ChatFlavor::Azure => format!("{}/openai/deployments/{}/chat/completions", base, config.model),
            _ => format!("{}/v1/chat/completions", base),
        };

        Ok(Self {
            client: build_client(config.timeout)?,
            flavor,
            url,
            api_key: config.api_key.expose().to_string(),
            api_version: config
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            // Azure selects the model through the deployment in the URL
            model: match self.flavor {
                ChatFlavor::Azure => None,
                _ => Some(self.model.as_str()),
            },
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[async_trait::async_trait]
impl AiProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        self.flavor.kind()
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        ensure_prompt(prompt)?;

        let request = self.client.post(&self.url).json(&self.request_body(prompt));
        let request = match self.flavor {
            ChatFlavor::Azure => request
                .header("api-key", &self.api_key)
                .query(&[("api-version", self.api_version.as_str())]),
            _ => request.bearer_auth(&self.api_key),
        };

        let response = request.send().await.map_err(map_send_error)?;
        let provider = self.flavor.kind().as_str();
        let parsed: ChatResponse = decode_json(response, provider).await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);

        require_text(content, provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::providers::ApiKey;

    fn config(kind: ProviderKind) -> ProviderConfig {
        ProviderConfig::new(kind, kind.default_model(), ApiKey::new("test-key-000000"))
    }

    #[test]
    fn test_openai_compatible_urls() {
        let provider = OpenAiProvider::new(&config(ProviderKind::OpenAi), ChatFlavor::OpenAi).unwrap();
        assert_eq!(provider.url, "https://api.openai.com/v1/chat/completions");

        let provider = OpenAiProvider::new(&config(ProviderKind::Mistral), ChatFlavor::Mistral).unwrap();
        assert_eq!(provider.url, "https://api.mistral.ai/v1/chat/completions");

        let cfg = config(ProviderKind::DeepSeek).with_endpoint("http://localhost:8080/");
        let provider = OpenAiProvider::new(&cfg, ChatFlavor::DeepSeek).unwrap();
        assert_eq!(provider.url, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_azure_url_uses_deployment() {
        let mut cfg = config(ProviderKind::AzureOpenAi).with_endpoint("https://res.openai.azure.com");
        cfg.model = "my-gpt4".to_string();
        let provider = OpenAiProvider::new(&cfg, ChatFlavor::Azure).unwrap();
        assert_eq!(provider.url, "https://res.openai.azure.com/openai/deployments/my-gpt4/chat/completions");
        assert_eq!(provider.api_version, DEFAULT_AZURE_API_VERSION);

        let body = serde_json::to_value(provider.request_body("hi")).unwrap();
        assert!(body.get("model").is_none());
    }

    #[test]
    fn test_request_body_shape() {
        let provider = OpenAiProvider::new(&config(ProviderKind::OpenAi), ChatFlavor::OpenAi).unwrap();
        let body = serde_json::to_value(provider.request_body("Rate this")).unwrap();
        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Rate this");
        assert_eq!(body["max_tokens"], 16);
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"0.75"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("0.75"));

        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
