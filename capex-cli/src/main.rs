//! capex-cli entry point.

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use capex_cli::commands;
use capex_cli::OutputFormat;
use capex_common::config::Config;
use capex_common::logging::init_stderr_logging;
use capex_dashboard::ReportFormat;
use clap::{Parser, Subcommand};

/// CapEx aggregation and ROI scoring.
#[derive(Parser, Debug)]
#[command(name = "capex-cli")]
#[command(version)]
#[command(about = "Aggregate CapEx records and score predicted ROI.", long_about = None)]
struct Cli {
    /// Config file (default: ~/.capex/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at the configured level instead of warnings only
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline once and print the scored groups
    Run {
        /// Records CSV (overrides data.source_path)
        #[arg(long)]
        data: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Build the dashboard report
    Report {
        /// Records CSV (overrides data.source_path)
        #[arg(long)]
        data: Option<PathBuf>,

        /// markdown or json
        #[arg(long, default_value = "markdown")]
        format: ReportFormat,

        /// Market for the NPV vs. risk series (default: first plotted market)
        #[arg(long)]
        market: Option<String>,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration, artifacts, and records
    Check {
        /// Records CSV (overrides data.source_path)
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Print the SHA-256 digest of a password for auth.password_sha256
    HashPassword,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => Ok(Config::load_with_env()?),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::HashPassword = cli.command {
        let password = rpassword::prompt_password("Password: ")?;
        let confirmation = rpassword::prompt_password("Confirm password: ")?;
        println!("{}", commands::hash_password(&password, &confirmation)?);
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    let level = if cli.verbose {
        config.observability.log_level.as_str()
    } else {
        "warn"
    };
    init_stderr_logging(level);

    let mut stdout = io::stdout().lock();
    match cli.command {
        Commands::HashPassword => Ok(()),
        Commands::Run { data, format } => {
            commands::run(&config, data.as_deref(), format, &mut stdout)
        }
        Commands::Report {
            data,
            format,
            market,
            output,
        } => commands::report(
            &config,
            data.as_deref(),
            format,
            market.as_deref(),
            output.as_deref(),
            &mut stdout,
        ),
        Commands::Check { data } => commands::check(&config, data.as_deref(), &mut stdout),
    }
}
