//! Tariff mirror service
//!
//! Pulls Wildberries box tariffs every hour, keeps a daily snapshot in the
//! database and mirrors today's snapshot into registered Google Sheets.
//!
//! ```sh
//! # Run the hourly service (default config: ~/.config/tariff-mirror/config.toml)
//! tariff-mirror
//!
//! # One cycle now, then exit
//! tariff-mirror once
//!
//! # Manage export destinations
//! tariff-mirror destinations add https://docs.google.com/spreadsheets/d/<id>/edit
//!
//! # Write a default config file
//! tariff-mirror init
//!
//! # Validate config without starting
//! tariff-mirror --check
//! ```

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use tariff_mirror::application::services::current_day;
use tariff_mirror::config::{default_config_path, AppConfig, CONFIG_PATH_ENV};
use tariff_mirror::domain::destination::extract_spreadsheet_id;
use tariff_mirror::server::{
    build_pipeline, connect, init_metrics, init_tracing, seed_destinations, ServiceHandle,
    ServiceOptions,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Mirrors Wildberries warehouse tariffs into Google Sheets.
#[derive(Parser, Debug)]
#[command(
    name = "tariff-mirror",
    version,
    about = "Mirror Wildberries box tariffs into Google Sheets",
    long_about = "Fetches Wildberries box tariffs hourly, stores a daily snapshot \
                  and republishes it to every registered spreadsheet.\n\n\
                  Default config: ~/.config/tariff-mirror/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = CONFIG_PATH_ENV, global = true)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Validate the configuration file and exit.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long, global = true)]
    no_migrate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until SIGINT/SIGTERM (default).
    Run,
    /// Run a single fetch → reconcile → export cycle and exit.
    Once {
        /// Day to reconcile and export (YYYY-MM-DD, default today).
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Write the default configuration to the config path.
    Init {
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Manage the spreadsheets that receive the export.
    Destinations {
        #[command(subcommand)]
        action: DestinationsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DestinationsCommand {
    /// List registered spreadsheets in export order.
    List,
    /// Register a spreadsheet by id or URL.
    Add { spreadsheet: String },
    /// Unregister a spreadsheet by id or URL.
    Remove { spreadsheet: String },
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    if let Some(Command::Init { force }) = cli.command {
        AppConfig::write_default(&config_path, force)?;
        println!("Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", config_path.display(), e);
            return Err(e.into());
        }
    };

    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());

    if let Err(e) = config.validate() {
        error!("{}", e);
        return Err(e.into());
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        println!("✅ Configuration is valid");
        println!("   Config file  : {}", config_path.display());
        println!("   Database     : {}", config.database.url);
        println!("   Source       : {}", config.source.base_url);
        println!("   Sheets API   : {}", config.sheets.base_url);
        println!("   Sheet name   : {}", config.sheets.sheet_name);
        println!("   Interval     : {} min", config.scheduler.interval_minutes);
        println!("   Run on start : {}", config.scheduler.run_on_start);
        println!("   Log level    : {}", config.logging.level);
        println!(
            "   Metrics      : {}",
            if config.metrics.enabled { config.metrics.listen.as_str() } else { "disabled" }
        );
        return Ok(());
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, !cli.no_migrate).await,
        Command::Once { date } => once(config, !cli.no_migrate, date).await,
        Command::Destinations { action } => destinations(config, !cli.no_migrate, action).await,
        // written before the config is loaded
        Command::Init { .. } => Ok(()),
    }
}

async fn run(config: AppConfig, auto_migrate: bool) -> Result<(), BoxError> {
    let handle = ServiceHandle::start(ServiceOptions {
        config,
        auto_migrate,
    })
    .await?;

    handle.install_signal_handler();
    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;
    Ok(())
}

async fn once(config: AppConfig, migrate: bool, date: Option<NaiveDate>) -> Result<(), BoxError> {
    init_metrics(&config)?;
    let (db, repos) = connect(&config, migrate).await?;
    seed_destinations(repos.as_ref(), &config.sheets.seed_destinations).await;
    let pipeline = build_pipeline(&config, repos)?;

    let report = pipeline.run_cycle(date.unwrap_or_else(current_day)).await;
    let _ = db.close().await;

    println!("Cycle {} for {}", report.run_id, report.day);
    if let Some(outcome) = &report.reconcile {
        println!("   Reconcile : {:?}", outcome);
    }
    if let Some(export) = &report.export {
        println!(
            "   Export    : {} rows, {} published, {} failed",
            export.rows,
            export.published.len(),
            export.failures.len()
        );
        for failure in &export.failures {
            println!("      ✗ {}", failure);
        }
    }
    for e in &report.errors {
        println!("   ! {}", e);
    }

    if report.is_success() {
        Ok(())
    } else {
        Err("cycle finished with errors".into())
    }
}

async fn destinations(
    config: AppConfig,
    migrate: bool,
    action: DestinationsCommand,
) -> Result<(), BoxError> {
    let (db, repos) = connect(&config, migrate).await?;
    let registry = repos.destinations();

    let result: Result<(), BoxError> = async {
        match action {
            DestinationsCommand::List => {
                for d in registry.list().await? {
                    println!("{}\t{}\t{}", d.id, d.destination_id, d.created_at.to_rfc3339());
                }
            }
            DestinationsCommand::Add { spreadsheet } => {
                let id = extract_spreadsheet_id(&spreadsheet)
                    .ok_or_else(|| format!("'{spreadsheet}' is not a spreadsheet id or URL"))?;
                let added = registry.add(&id).await?;
                println!("Registered {} (#{})", added.destination_id, added.id);
            }
            DestinationsCommand::Remove { spreadsheet } => {
                let id = extract_spreadsheet_id(&spreadsheet).unwrap_or(spreadsheet);
                match registry.remove(&id).await? {
                    0 => println!("{} was not registered", id),
                    _ => println!("Removed {}", id),
                }
            }
        }
        Ok(())
    }
    .await;

    let _ = db.close().await;
    result
}
