//! `quorum`: configuration checks and local signing simulation

use clap::{Parser, Subcommand};
use quorum_core::ThresholdScheme;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "quorum")]
#[command(about = "Bonded threshold signing coordinator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, overlay QUORUM_* variables onto, and validate a configuration file
    CheckConfig {
        /// Path to a .toml or .json configuration file
        path: PathBuf,
    },

    /// Run one signing session end to end against simulated signers
    Simulate {
        /// Number of simulated signers to register
        #[arg(short = 'n', long, default_value = "5")]
        signers: u8,

        /// Threshold scheme (frost, cggmp21, ringtail); overrides the config
        #[arg(short, long)]
        scheme: Option<ThresholdScheme>,

        /// Message to sign
        #[arg(short, long, default_value = "quorum simulation")]
        message: String,

        /// Optional configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::CheckConfig { path } => commands::check_config::run(&path),
        Commands::Simulate {
            signers,
            scheme,
            message,
            config,
        } => commands::simulate::run(signers, scheme, &message, config.as_deref()).await,
    }
}
