use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use tracing::{info, warn};
use weather_etl_core::{Config, config::split_cities, run_etl};

use crate::logging::init_logging;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-etl", version, about = "Load weatherapi.com observations into SQLite")]
pub struct Cli {
    /// Config file; defaults to the platform config directory.
    #[arg(short, long, global = true, env = "WEATHER_ETL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch forecast and history for every configured city once (default).
    Run,

    /// Write the config file interactively.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command.unwrap_or(Command::Run) {
            Command::Run => run_once(self.config).await,
            Command::Configure => configure(self.config),
        }
    }
}

async fn run_once(path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load(path.as_deref())?;
    init_logging(&config.logging.level);

    let summary = run_etl(&config).await?;

    info!(
        requests = summary.requests,
        inserted = summary.inserted,
        updated = summary.updated,
        fetch_failures = summary.fetch_failures,
        malformed_payloads = summary.malformed_payloads,
        load_failures = summary.load_failures,
        "Weather ETL run finished"
    );
    if summary.failures() > 0 {
        warn!(
            skipped = summary.failures(),
            "Some items were skipped, see the errors above"
        );
    }

    Ok(())
}

fn configure(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match path {
        Some(p) => p,
        None => Config::config_file_path()?,
    };

    let mut cfg = existing_config(&path)?;

    cfg.weather.api_key = Password::new("weatherapi.com API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let current_cities = cfg.weather.cities.join(", ");
    let mut cities_prompt = Text::new("Cities (comma separated):");
    if !current_cities.is_empty() {
        cities_prompt = cities_prompt.with_default(&current_cities);
    }
    let cities = cities_prompt.prompt().context("Failed to read cities")?;
    cfg.weather.cities = split_cities(&cities);

    let current_db = cfg.database.path.display().to_string();
    let db_path = Text::new("Database file:")
        .with_default(&current_db)
        .prompt()
        .context("Failed to read database path")?;
    cfg.database.path = PathBuf::from(db_path.trim());

    cfg.validate()?;
    cfg.save(&path)?;

    println!("Saved configuration to {}", path.display());
    Ok(())
}

/// Settings already on disk, unvalidated, so a re-run only changes what it asks
/// about. A file that does not parse is left alone.
fn existing_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    Config::read(path).with_context(|| {
        format!(
            "Refusing to overwrite {}; fix or remove it and run `weather-etl configure` again",
            path.display()
        )
    })
}
