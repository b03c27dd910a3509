mod claude_api;
mod cohere;
mod gemini_api;
mod http;
mod openai;

pub use claude_api::ClaudeApiProvider;
pub use cohere::CohereProvider;
pub use gemini_api::GeminiApiProvider;
pub use openai::{ChatFlavor, OpenAiProvider};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, ProviderError, Result};

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

/// Hosted text-completion services litfilter can score with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "cohere")]
    Cohere,
    #[serde(rename = "azure-openai")]
    AzureOpenAi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Google,
        ProviderKind::DeepSeek,
        ProviderKind::Mistral,
        ProviderKind::Cohere,
        ProviderKind::AzureOpenAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Cohere => "cohere",
            ProviderKind::AzureOpenAi => "azure-openai",
        }
    }

    /// Human readable name for reports
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::Google => "Google",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::Mistral => "Mistral",
            ProviderKind::Cohere => "Cohere",
            ProviderKind::AzureOpenAi => "Azure OpenAI",
        }
    }

    /// Base URL used when no endpoint override is configured.
    /// Azure has no public default; the resource endpoint is mandatory.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("https://api.openai.com"),
            ProviderKind::Anthropic => Some("https://api.anthropic.com"),
            ProviderKind::Google => Some("https://generativelanguage.googleapis.com"),
            ProviderKind::DeepSeek => Some("https://api.deepseek.com"),
            ProviderKind::Mistral => Some("https://api.mistral.ai"),
            ProviderKind::Cohere => Some("https://api.cohere.ai"),
            ProviderKind::AzureOpenAi => None,
        }
    }

    /// Models advertised for the provider, first entry is the default
    pub fn known_models(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAi => &["gpt-4.1", "gpt-4.1-mini", "gpt-4.1-nano", "gpt-4o", "gpt-4o-mini"],
            ProviderKind::Anthropic => &[
                "claude-3-7-sonnet-20250219",
                "claude-3-5-sonnet-20241022",
                "claude-3-5-haiku-20241022",
                "claude-3-opus-20240229",
            ],
            ProviderKind::Google => &["gemini-2.0-flash", "gemini-2.0-flash-lite", "gemini-1.5-flash", "gemini-1.5-pro"],
            ProviderKind::DeepSeek => &["deepseek-chat", "deepseek-reasoner"],
            ProviderKind::Mistral => &["mistral-large-latest", "mistral-medium-latest", "mistral-small-latest", "open-mistral-7b"],
            ProviderKind::Cohere => &["command-r-plus", "command-r", "command-light"],
            ProviderKind::AzureOpenAi => &["gpt-4", "gpt-4-turbo", "gpt-35-turbo"],
        }
    }

    pub fn default_model(&self) -> &'static str {
        self.known_models()[0]
    }

    pub fn is_known_model(&self, model: &str) -> bool {
        self.known_models().contains(&model)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        ProviderKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| Error::Config(format!("Unknown AI provider: {}", s)))
    }
}

/// API secret. Formatting never prints the full value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Masked form, e.g. `sk-…wxyz`
    pub fn redacted(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey({})", self.redacted())
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Everything needed to talk to one provider for the length of a run
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: ApiKey,
    /// Overrides the provider's base URL; required for Azure
    pub endpoint: Option<String>,
    /// Azure `api-version` query parameter
    pub api_version: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind, model: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            kind,
            model: model.into(),
            api_key,
            endpoint: None,
            api_version: None,
            temperature: 0.0,
            max_tokens: 16,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the preconditions a run depends on
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(Error::Config(format!("{} API key not configured", self.kind.display_name())));
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config(format!("{} model not configured", self.kind.display_name())));
        }
        if self.timeout.is_zero() {
            return Err(Error::Config("Request timeout must be greater than zero".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(format!(
                "Temperature must be between 0 and 2, got {}",
                self.temperature
            )));
        }
        match self.endpoint.as_deref() {
            Some(endpoint) => {
                url::Url::parse(endpoint)
                    .map_err(|e| Error::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
            }
            None if self.kind == ProviderKind::AzureOpenAi => {
                return Err(Error::Config("Azure OpenAI requires an endpoint".to_string()));
            }
            None => {}
        }
        Ok(())
    }

    /// Endpoint override or the provider default, without trailing slash
    pub fn base_url(&self) -> Result<String> {
        let base = self
            .endpoint
            .as_deref()
            .or(self.kind.default_base_url())
            .ok_or_else(|| Error::Config(format!("{} requires an endpoint", self.kind.display_name())))?;
        Ok(base.trim_end_matches('/').to_string())
    }
}

/// Uniform interface over the hosted completion APIs.
///
/// Implementations perform exactly one network call per `complete` and never
/// retry; the batch pipeline owns the retry policy.
#[async_trait::async_trait]
pub trait AiProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    /// Send the prompt and return the raw completion text
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError>;
}

/// Build the client for the configured provider
pub fn build(config: &ProviderConfig) -> Result<Arc<dyn AiProvider>> {
    config.validate()?;

    let provider: Arc<dyn AiProvider> = match config.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config, ChatFlavor::OpenAi)?),
        ProviderKind::DeepSeek => Arc::new(OpenAiProvider::new(config, ChatFlavor::DeepSeek)?),
        ProviderKind::Mistral => Arc::new(OpenAiProvider::new(config, ChatFlavor::Mistral)?),
        ProviderKind::AzureOpenAi => Arc::new(OpenAiProvider::new(config, ChatFlavor::Azure)?),
        ProviderKind::Anthropic => Arc::new(ClaudeApiProvider::new(config)?),
        ProviderKind::Google => Arc::new(GeminiApiProvider::new(config)?),
        ProviderKind::Cohere => Arc::new(CohereProvider::new(config)?),
    };

    tracing::debug!(
        provider = %config.kind,
        model = %config.model,
        api_key = %config.api_key,
        "Built AI provider client"
    );

    Ok(provider)
}

/// Send a short ping prompt to check credentials and connectivity
pub async fn test_connection(config: &ProviderConfig) -> Result<String> {
    let provider = build(config)?;
    let reply = provider
        .complete("Hello, testing the connection. Reply with OK.")
        .await?;
    tracing::info!(provider = %config.kind, model = %config.model, "Connection test succeeded");
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(kind: ProviderKind) -> ProviderConfig {
        ProviderConfig::new(kind, kind.default_model(), ApiKey::new("sk-test-1234567890"))
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("Azure-OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::AzureOpenAi);
        assert_eq!("azure_openai".parse::<ProviderKind>().unwrap(), ProviderKind::AzureOpenAi);
        assert!("llama".parse::<ProviderKind>().is_err());

        for kind in ProviderKind::ALL {
            assert_eq!(kind.as_str().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_api_key_is_redacted() {
        let key = ApiKey::new("sk-abcdefghijklmnop");
        assert_eq!(key.redacted(), "sk-…mnop");
        assert!(!format!("{:?}", key).contains("abcdefghijkl"));
        assert_eq!(ApiKey::new("short").to_string(), "****");

        let config = config(ProviderKind::OpenAi);
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-test-1234567890"));
    }

    #[test]
    fn test_validate_rejects_missing_key() {
        let mut cfg = config(ProviderKind::Anthropic);
        cfg.api_key = ApiKey::new("   ");
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_azure_requires_endpoint() {
        let cfg = config(ProviderKind::AzureOpenAi);
        assert!(cfg.validate().is_err());

        let cfg = cfg.with_endpoint("https://my-resource.openai.azure.com/");
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.base_url().unwrap(), "https://my-resource.openai.azure.com");
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let cfg = config(ProviderKind::OpenAi).with_endpoint("not a url");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_base_url_defaults() {
        assert_eq!(config(ProviderKind::DeepSeek).base_url().unwrap(), "https://api.deepseek.com");
        assert!(config(ProviderKind::AzureOpenAi).base_url().is_err());
    }

    #[test]
    fn test_build_every_provider() {
        for kind in ProviderKind::ALL {
            let mut cfg = config(kind);
            if kind == ProviderKind::AzureOpenAi {
                cfg = cfg.with_endpoint("https://example.openai.azure.com");
            }
            let provider = build(&cfg).unwrap();
            assert_eq!(provider.kind(), kind);
            assert_eq!(provider.model(), kind.default_model());
        }
    }
}
