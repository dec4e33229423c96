mod commands;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use planning_core::config::DEFAULT_CONFIG_FILE;

#[derive(Parser)]
#[command(name = "planning-updater")]
#[command(about = "Keep a planning database in sync with iCalendar feeds")]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run update cycles until stopped
    Run {
        /// Path to the configuration file (JSON or TOML)
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Run a single cycle, ignoring the configured frequency
        #[arg(long)]
        once: bool,

        /// Keep records in memory instead of the configured database
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the configuration and print it
    Check {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Read one feed and summarize its events
    Inspect {
        /// Feed file or http(s) URL
        source: String,

        /// Parse events with this branch's parser
        #[arg(short, long)]
        branch: Option<String>,

        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Manage hand-entered events
    Custom {
        #[command(subcommand)]
        action: commands::custom::CustomAction,

        #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            once,
            dry_run,
        } => commands::run::run(&config, once, dry_run).await,
        Commands::Check { config } => commands::check::run(&config),
        Commands::Inspect {
            source,
            branch,
            config,
        } => commands::inspect::run(&source, branch.as_deref(), &config).await,
        Commands::Custom { action, config } => commands::custom::run(action, &config),
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
