use anyhow::Result;

use litfilter_core::ai::providers;
use litfilter_core::AppConfig;

use crate::ProviderArgs;

pub async fn run(config: &AppConfig, args: &ProviderArgs) -> Result<()> {
    let provider = super::resolve_provider(config, args)?;

    println!(
        "Testing {} with model {} (key {})...",
        provider.kind.display_name(),
        provider.model,
        provider.api_key
    );

    let reply = providers::test_connection(&provider).await?;
    println!("Connection OK. Reply: {}", reply.trim());

    Ok(())
}
