use anyhow::Result;

use litfilter_core::ai::ProviderKind;
use litfilter_core::config::api_key_env_var;

pub fn run(provider: Option<&str>) -> Result<()> {
    let kinds = match provider {
        Some(name) => vec![name.parse::<ProviderKind>()?],
        None => ProviderKind::ALL.to_vec(),
    };

    for kind in kinds {
        println!("{} ({})", kind.display_name(), kind);
        println!("  API key env: {}", api_key_env_var(kind));
        for model in kind.known_models() {
            let marker = if *model == kind.default_model() { " (default)" } else { "" };
            println!("    {}{}", model, marker);
        }
        if kind == ProviderKind::AzureOpenAi {
            println!("    Use your deployment name as the model; an endpoint is required.");
        }
        println!();
    }

    Ok(())
}
