use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::providers::{ApiKey, ProviderConfig, ProviderKind, DEFAULT_AZURE_API_VERSION};
use crate::sheet::ColumnMapping;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// AI provider: "openai", "anthropic", "google", "deepseek", "mistral", "cohere", "azure-openai"
    #[serde(default = "default_ai_provider")]
    pub provider: ProviderKind,
    /// Sampling temperature; 0 keeps scores reproducible
    #[serde(default)]
    pub temperature: f32,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Completion token limit; a score needs very few
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Rows scored concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Calls per row including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First retry delay in milliseconds, doubled on every further retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default)]
    pub openai: ProviderSettings,
    #[serde(default)]
    pub anthropic: ProviderSettings,
    #[serde(default)]
    pub google: ProviderSettings,
    #[serde(default)]
    pub deepseek: ProviderSettings,
    #[serde(default)]
    pub mistral: ProviderSettings,
    #[serde(default)]
    pub cohere: ProviderSettings,
    #[serde(default)]
    pub azure_openai: ProviderSettings,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_ai_provider(),
            temperature: 0.0,
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            openai: ProviderSettings::default(),
            anthropic: ProviderSettings::default(),
            google: ProviderSettings::default(),
            deepseek: ProviderSettings::default(),
            mistral: ProviderSettings::default(),
            cohere: ProviderSettings::default(),
            azure_openai: ProviderSettings::default(),
        }
    }
}

impl AiConfig {
    pub fn settings(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Google => &self.google,
            ProviderKind::DeepSeek => &self.deepseek,
            ProviderKind::Mistral => &self.mistral,
            ProviderKind::Cohere => &self.cohere,
            ProviderKind::AzureOpenAi => &self.azure_openai,
        }
    }

    pub fn settings_mut(&mut self, kind: ProviderKind) -> &mut ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &mut self.openai,
            ProviderKind::Anthropic => &mut self.anthropic,
            ProviderKind::Google => &mut self.google,
            ProviderKind::DeepSeek => &mut self.deepseek,
            ProviderKind::Mistral => &mut self.mistral,
            ProviderKind::Cohere => &mut self.cohere,
            ProviderKind::AzureOpenAi => &mut self.azure_openai,
        }
    }
}

/// Credentials and model for one provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name, or the Azure deployment name
    #[serde(default)]
    pub model: Option<String>,
    /// Endpoint override; required for Azure OpenAI
    #[serde(default)]
    pub base_url: Option<String>,
    /// Azure `api-version`
    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum relevance score (0.0-1.0) for a row to be kept
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_title_column")]
    pub title_column: String,
    #[serde(default = "default_abstract_column")]
    pub abstract_column: Option<String>,
    #[serde(default)]
    pub keywords_column: Option<String>,
    #[serde(default)]
    pub categories_column: Option<String>,
    /// Path to a custom prompt template file
    #[serde(default)]
    pub prompt_template: Option<PathBuf>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            title_column: default_title_column(),
            abstract_column: default_abstract_column(),
            keywords_column: None,
            categories_column: None,
            prompt_template: None,
        }
    }
}

impl FilterConfig {
    pub fn column_mapping(&self) -> ColumnMapping {
        ColumnMapping {
            title: self.title_column.clone(),
            abstract_text: self.abstract_column.clone(),
            keywords: self.keywords_column.clone(),
            categories: self.categories_column.clone(),
        }
    }

    pub fn prompt_template_path(&self) -> Option<PathBuf> {
        self.prompt_template.as_deref().map(expand_tilde)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ai_provider() -> ProviderKind {
    ProviderKind::OpenAi
}

fn default_timeout() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    16
}

fn default_concurrency() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_threshold() -> f64 {
    0.5
}

fn default_title_column() -> String {
    "Title".to_string()
}

fn default_abstract_column() -> Option<String> {
    Some("Abstract".to_string())
}

/// Expand ~ to home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &std::path::Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)
                .map_err(|e| crate::Error::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/litfilter/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("litfilter")
            .join("config.toml")
    }

    /// Client settings for `kind`, validated.
    ///
    /// The API key falls back to the provider's conventional environment
    /// variable (`OPENAI_API_KEY`, ...) when the file has none.
    pub fn provider_config(&self, kind: ProviderKind) -> crate::Result<ProviderConfig> {
        let settings = self.ai.settings(kind);

        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(api_key_env_var(kind)).ok())
            .unwrap_or_default();
        let model = settings
            .model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string());

        let mut config = ProviderConfig::new(kind, model, ApiKey::new(api_key))
            .with_timeout(Duration::from_secs(self.ai.timeout_secs));
        config.temperature = self.ai.temperature;
        config.max_tokens = self.ai.max_tokens;
        config.endpoint = settings.base_url.clone().filter(|u| !u.trim().is_empty());
        if kind == ProviderKind::AzureOpenAi {
            config.api_version = Some(
                settings
                    .api_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Config for the default provider
    pub fn default_provider_config(&self) -> crate::Result<ProviderConfig> {
        self.provider_config(self.ai.provider)
    }

    /// Copy with every API key masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for kind in ProviderKind::ALL {
            let settings = copy.ai.settings_mut(kind);
            if let Some(key) = settings.api_key.take() {
                settings.api_key = Some(ApiKey::new(key).redacted());
            }
        }
        copy
    }
}

/// Environment variable consulted when the config file has no key
pub fn api_key_env_var(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "OPENAI_API_KEY",
        ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
        ProviderKind::Google => "GOOGLE_API_KEY",
        ProviderKind::DeepSeek => "DEEPSEEK_API_KEY",
        ProviderKind::Mistral => "MISTRAL_API_KEY",
        ProviderKind::Cohere => "COHERE_API_KEY",
        ProviderKind::AzureOpenAi => "AZURE_OPENAI_API_KEY",
    }
}
