pub mod columns;
pub mod config;
pub mod models;
pub mod score;
pub mod test_connection;

use anyhow::{Context, Result};

use litfilter_core::ai::{ProviderConfig, ProviderKind};
use litfilter_core::AppConfig;

use crate::ProviderArgs;

/// Provider settings from the config file with command line overrides applied
pub fn resolve_provider(config: &AppConfig, args: &ProviderArgs) -> Result<ProviderConfig> {
    let kind = match args.provider.as_deref() {
        Some(name) => name.parse::<ProviderKind>()?,
        None => config.ai.provider,
    };

    let mut config = config.clone();
    let settings = config.ai.settings_mut(kind);
    if let Some(model) = &args.model {
        settings.model = Some(model.clone());
    }
    if let Some(key) = &args.api_key {
        settings.api_key = Some(key.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        settings.base_url = Some(endpoint.clone());
    }

    config
        .provider_config(kind)
        .with_context(|| {
            format!(
                "Invalid {} settings (edit {} or pass --api-key/--model)",
                kind.display_name(),
                AppConfig::config_path().display()
            )
        })
}
