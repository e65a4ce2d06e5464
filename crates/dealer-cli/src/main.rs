use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use dealer_scraper::{export, export_to_path, ExportFormat, ScrapeOutcome, Scraper, NO_DATA_CAUSES};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dealer-cli")]
#[command(about = "Extract dealership locations from a dealer group's website")]
struct Cli {
    /// Dealer group name stamped on every record.
    dealer_group: String,

    /// The group's locations page.
    url: String,

    /// Output format; `xlsx` writes a spreadsheet.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Write to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Never launch a headless browser.
    #[arg(long)]
    no_browser: bool,

    /// Never call the LLM fallback.
    #[arg(long)]
    no_llm: bool,

    /// Learned-rule store (overrides `DEALER_RULES_PATH`).
    #[arg(long)]
    rules_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Tsv,
    Xlsx,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ExportFormat::Json,
            OutputFormat::Csv => ExportFormat::Csv,
            OutputFormat::Tsv => ExportFormat::Tsv,
            OutputFormat::Xlsx => ExportFormat::Xlsx,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = dealer_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_browser {
        config.browser_enabled = false;
    }
    if cli.no_llm {
        config.llm_enabled = false;
    }
    if let Some(path) = &cli.rules_path {
        config.rules_path.clone_from(path);
    }
    tracing::debug!(?config, "configuration loaded");

    let scraper = Scraper::from_config(&config)?;
    match scraper.scrape(&cli.dealer_group, &cli.url).await {
        ScrapeOutcome::Found { records, source } => {
            tracing::info!(count = records.len(), %source, "dealerships found");
            let format = ExportFormat::from(cli.format);
            match &cli.output {
                Some(path) => export_to_path(&records, format, path)?,
                None => std::io::stdout().write_all(&export(&records, format)?)?,
            }
            Ok(())
        }
        ScrapeOutcome::NoData { reason } => {
            eprintln!("No dealerships found: {reason}");
            eprintln!("Possible causes:");
            for cause in NO_DATA_CAUSES {
                eprintln!("  - {cause}");
            }
            std::process::exit(1);
        }
        ScrapeOutcome::Failed { error } => {
            anyhow::bail!("scrape of {} failed: {error}", cli.url)
        }
    }
}

#[cfg(test)]
mod tests;
