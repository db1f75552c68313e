//! Build Queue - Development Tools
//!
//! # Usage
//!
//! ```bash
//! # Validate every catalog in a directory
//! cargo run -p buildqueue_tools -- validate data
//!
//! # Replay a scenario and print a summary (or a JSON report)
//! cargo run -p buildqueue_tools -- simulate data/scenarios/barracks_rush.ron --json
//! ```
//!
//! Logs go to stderr so JSON on stdout stays machine-readable.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use buildqueue_tools::data_loader::{load_scenario, ToolResult};
use buildqueue_tools::scenario::run_scenario;
use buildqueue_tools::validate::validate_path;

#[derive(Parser)]
#[command(name = "buildqueue-tools")]
#[command(about = "Development tools for build queue catalogs and scenarios")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate catalog files
    Validate {
        /// Catalog file or directory of catalogs
        #[arg(default_value = "data")]
        path: PathBuf,
    },
    /// Run a scripted scenario
    Simulate {
        /// Scenario file
        path: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let result = match cli.command {
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Simulate { path, json } => cmd_simulate(&path, json),
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn cmd_validate(path: &Path) -> ToolResult<()> {
    tracing::info!("Validating catalogs in: {}", path.display());
    let count = validate_path(path)?;
    tracing::info!("Validation passed: {count} definitions");
    Ok(())
}

fn cmd_simulate(path: &Path, json: bool) -> ToolResult<()> {
    let scenario = load_scenario(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let report = run_scenario(&scenario, base_dir)?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.summary());
    }
    Ok(())
}
