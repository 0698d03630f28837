use anyhow::Result;
use clap::{Parser, Subcommand};
use sportstrack::core::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for sportstrack::AppCommand {
    fn from(cmd: Commands) -> sportstrack::AppCommand {
        match cmd {
            Commands::Report { refresh } => sportstrack::AppCommand::Report { refresh },
            Commands::Export { csv, xlsx, refresh } => {
                sportstrack::AppCommand::Export { csv, xlsx, refresh }
            }
            Commands::Session => sportstrack::AppCommand::Session,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display the company table (default)
    Report {
        /// Bypass the cached report and FX rates
        #[arg(short, long)]
        refresh: bool,
    },
    /// Write the company table to CSV and/or spreadsheet files
    Export {
        /// CSV destination file
        #[arg(long, required_unless_present = "xlsx")]
        csv: Option<PathBuf>,
        /// Spreadsheet (xlsx) destination file
        #[arg(long)]
        xlsx: Option<PathBuf>,
        /// Bypass the cached report and FX rates
        #[arg(short, long)]
        refresh: bool,
    },
    /// Interactive session with on-demand refresh
    Session,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let command = cli.command.unwrap_or(Commands::Report { refresh: false });
    let result = match command {
        Commands::Setup => sportstrack::cli::setup::setup(),
        cmd => sportstrack::run_command(cmd.into(), cli.config_path.as_deref()).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
