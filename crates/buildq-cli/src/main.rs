//! buildq CLI tool.

use buildq_config::parse_project_file;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod host;
mod shell;

#[derive(Parser)]
#[command(name = "buildq")]
#[command(about = "Target-switch-aware build queue", long_about = None)]
struct Cli {
    /// Path to the project configuration
    #[arg(long, global = true, env = "BUILDQ_CONFIG", default_value = "buildq.kdl")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a project configuration
    Validate {
        /// Path to the configuration file (defaults to --config)
        path: Option<String>,
    },
    /// Submit a batch and run it to completion
    Run {
        /// Batch name
        batch: String,
        /// Target the editor starts on
        #[arg(long)]
        active: Option<String>,
    },
    /// Continue a batch left behind by an interrupted run
    Resume,
    /// Show the queued batch
    Status,
    /// Drop the queued batch without delivering results
    Cancel,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_level(&cli.config))),
        )
        .init();

    match cli.command {
        Commands::Validate { path } => {
            commands::validate(path.as_deref().unwrap_or(&cli.config))?;
        }
        Commands::Run { batch, active } => {
            commands::run::run(&cli.config, &batch, active).await?;
        }
        Commands::Resume => {
            commands::run::resume(&cli.config).await?;
        }
        Commands::Status => {
            commands::status(&cli.config)?;
        }
        Commands::Cancel => {
            commands::cancel(&cli.config)?;
        }
    }

    Ok(())
}

/// The project's `log-level`, or `info` when the project cannot be read.
fn default_log_level(config: &str) -> String {
    parse_project_file(config)
        .map(|project| project.settings.log_level)
        .unwrap_or_else(|_| "info".to_string())
}
