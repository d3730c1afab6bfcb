mod commands;
mod config;
mod domain;
mod kb;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::domain::FatalError;

#[derive(Parser)]
#[command(
    name = "clusterlens",
    version,
    about = "Pacemaker cluster diagnostic report analyzer"
)]
struct Cli {
    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the cluster model, merge logs, and evaluate known-issue patterns
    Analyze {
        /// Extracted cluster report directory
        source: PathBuf,

        /// Reports output directory (default: <source>/reports)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Skip knowledge-base searches for applicable findings
        #[arg(long)]
        no_kb_search: bool,
    },

    /// Combine and chronologically sort per-node log files
    Logs {
        /// Extracted cluster report directory
        source: PathBuf,

        /// Reports output directory (default: <source>/reports)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Re-evaluate the pattern catalog against a stored cluster model
    Patterns {
        /// Reports directory holding report_data.json
        reports: PathBuf,

        /// Skip knowledge-base searches for applicable findings
        #[arg(long)]
        no_kb_search: bool,
    },
}

fn init_tracing(cli_level: Option<&str>) {
    let default_level = cli_level
        .map(str::to_string)
        .or_else(|| config::load().ok().and_then(|cfg| cfg.log_level))
        .unwrap_or_else(|| "warn".to_string());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let result = match cli.command {
        Commands::Analyze {
            source,
            output,
            no_kb_search,
        } => commands::analyze::run(source, output, no_kb_search),
        Commands::Logs { source, output } => commands::logs::run(source, output),
        Commands::Patterns {
            reports,
            no_kb_search,
        } => commands::patterns::run(reports, no_kb_search),
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        let code = err
            .downcast_ref::<FatalError>()
            .map(FatalError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
