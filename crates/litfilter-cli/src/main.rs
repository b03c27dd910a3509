use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use litfilter_core::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "litfilter")]
#[command(author, version, about = "Filter publication spreadsheets by AI-scored relevance to a research topic")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every row against a topic and export the relevant ones
    Score(ScoreArgs),
    /// List the column headers of a spreadsheet
    Columns {
        /// Spreadsheet (.xlsx, .xls, .ods, .csv, .tsv)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// List supported providers and their models
    Models {
        /// Only show this provider
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Send a short prompt to check credentials and connectivity
    TestConnection(ProviderArgs),
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration with API keys masked
    Show,
    /// Print the configuration file location
    Path,
}

/// Provider selection, overriding the configuration file
#[derive(Args, Clone, Default)]
pub struct ProviderArgs {
    /// openai, anthropic, google, deepseek, mistral, cohere or azure-openai
    #[arg(short, long)]
    pub provider: Option<String>,
    /// Model name (Azure: deployment name)
    #[arg(short, long)]
    pub model: Option<String>,
    /// API key; prefer the config file or the provider's environment variable
    #[arg(long)]
    pub api_key: Option<String>,
    /// Endpoint override (required for Azure OpenAI)
    #[arg(long)]
    pub endpoint: Option<String>,
}

#[derive(Args)]
pub struct ScoreArgs {
    /// Spreadsheet with one publication per row
    #[arg(short, long)]
    pub input: PathBuf,
    /// Export path (.xlsx or .csv)
    #[arg(short, long)]
    pub output: PathBuf,
    /// Research topic the publications are scored against
    #[arg(short, long)]
    pub topic: String,
    /// Minimum score (0-1) for a row to be exported
    #[arg(long)]
    pub threshold: Option<f64>,
    #[command(flatten)]
    pub provider: ProviderArgs,
    /// Rows scored concurrently (1-16)
    #[arg(short, long)]
    pub concurrency: Option<usize>,
    /// Calls per row before giving up on transient errors
    #[arg(long)]
    pub max_attempts: Option<u32>,
    /// Only score the first N rows
    #[arg(long)]
    pub max_records: Option<usize>,
    /// Custom prompt template with {TOPIC} {TITLE} {ABSTRACT} {KEYWORDS} {CATEGORIES}
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,
    #[arg(long)]
    pub title_col: Option<String>,
    #[arg(long)]
    pub abstract_col: Option<String>,
    #[arg(long)]
    pub keywords_col: Option<String>,
    #[arg(long)]
    pub categories_col: Option<String>,
    /// Export every scored row, not only those above the threshold
    #[arg(long)]
    pub all_rows: bool,
    /// Accept verbal ratings such as "very relevant" when no number is given
    #[arg(long)]
    pub verbal_scale: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Score(args) => commands::score::run(&config, args).await,
        Commands::Columns { input } => commands::columns::run(&input),
        Commands::Models { provider } => commands::models::run(provider.as_deref()),
        Commands::TestConnection(args) => commands::test_connection::run(&config, &args).await,
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => commands::config::init(force),
            ConfigAction::Show => commands::config::show(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
