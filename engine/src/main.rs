// Ensemble agent workflow runner
// Main entry point for the ensemble binary

use anyhow::Context;
use clap::Parser;
use ensemble_engine::cli::{Cli, Command, ConfigAction};
use ensemble_engine::config::Config;
use ensemble_engine::handlers::{
    handle_config_show, handle_run, handle_validate, handle_workflows, OutputFormat,
};
use ensemble_engine::telemetry::{init_telemetry_with_level, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_create().context("Failed to load config")?,
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    let log_format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Auto
    };
    init_telemetry_with_level(log_level, log_format);

    tracing::info!(
        "Ensemble v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Run {
            agency,
            workflow,
            brief,
            context,
            timeout_ms,
        } => {
            tracing::info!("Running workflow {} from {}", workflow, agency.display());
            handle_run(&agency, &workflow, brief, context, timeout_ms, &config, format).await
        }

        Command::Validate { agency } => handle_validate(&agency, &config, format).await,

        Command::Workflows { agency } => handle_workflows(&agency, &config, format).await,

        Command::Config { action } => match action {
            ConfigAction::Show => handle_config_show(&config, format),
            ConfigAction::Path => {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => Config::default_config_path()?,
                };
                println!("{}", path.display());
                Ok(())
            }
            ConfigAction::Validate => {
                config.validate()?;
                println!("Configuration is valid");
                Ok(())
            }
        },
    }
}
