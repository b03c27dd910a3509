use anyhow::{Context, Result};

use litfilter_core::AppConfig;

pub fn init(force: bool) -> Result<()> {
    let path = AppConfig::config_path();

    if path.exists() && !force {
        println!("Configuration already exists: {}", path.display());
        println!("Use --force to overwrite it with the defaults.");
        return Ok(());
    }

    AppConfig::default().save()?;
    println!("Wrote default configuration to {}", path.display());
    println!("Add an API key under [ai.<provider>] or set the provider's environment variable.");

    Ok(())
}

pub fn show(config: &AppConfig) -> Result<()> {
    let content = toml::to_string_pretty(&config.redacted()).context("Failed to render configuration")?;
    println!("# {}", AppConfig::config_path().display());
    println!("{}", content);
    Ok(())
}

pub fn path() -> Result<()> {
    println!("{}", AppConfig::config_path().display());
    Ok(())
}
