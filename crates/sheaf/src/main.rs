use clap::Parser;
use env_logger::Env;
use log::{debug, error, info};
use std::path::PathBuf;
use std::str::FromStr;

use sheaf::config::{BundleConfig, Mode};
use sheaf::orchestrator::BuildOrchestrator;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Build mode (development or production), overriding the config file
    #[arg(short, long)]
    mode: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("Starting sheaf bundler");

    // Load configuration
    let mut config = BundleConfig::load(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config.mode = Mode::from_str(&mode)?;
    }
    debug!("Configuration: {:?}", config);

    let report = BuildOrchestrator::new(config).build()?;
    for artifact in &report.artifacts {
        info!(
            "Bundled entry '{}' -> {} ({} bytes)",
            artifact.entry_name,
            artifact.relative_path.display(),
            artifact.len()
        );
    }

    if !report.is_success() {
        error!("{}", report.describe_failures());
        anyhow::bail!(
            "{} of {} entries failed",
            report.failures.len(),
            report.failures.len() + report.artifacts.len()
        );
    }

    info!("Build completed successfully");
    Ok(())
}
