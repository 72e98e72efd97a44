// ABOUTME: CLI entry point for pg-compare
// ABOUTME: Parses commands, initializes logging, and routes to the command handlers

use clap::{Parser, Subcommand};
use pg_compare::commands::{self, CompareOptions, PrepareOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pg-compare")]
#[command(about = "Compare PostgreSQL source and destination databases and reconcile ownership", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare catalogs and row counts between source and destination
    Compare {
        /// Path to the JSON or TOML config file
        #[arg(short, long)]
        config: PathBuf,
        /// Show only rows that differ or failed
        #[arg(short = 's', long = "show-false")]
        show_false: bool,
        /// Run as part of the scheduled workflow (enables missing-sequence creation)
        #[arg(long)]
        scheduled: bool,
        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Transfer drifted object ownership on the source to the owner role
    Prepare {
        /// Path to the JSON or TOML config file
        #[arg(short, long)]
        config: PathBuf,
        /// Truncate destination tables after the ownership changes
        #[arg(short = 't', long)]
        truncate_destination: bool,
        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise info, or debug with --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Compare {
            config,
            show_false,
            scheduled,
            yes,
        } => {
            commands::compare(
                &config,
                CompareOptions {
                    show_false_only: show_false,
                    scheduled,
                    assume_yes: yes,
                },
            )
            .await
        }
        Commands::Prepare {
            config,
            truncate_destination,
            yes,
        } => {
            commands::prepare(
                &config,
                PrepareOptions {
                    truncate_destination,
                    assume_yes: yes,
                },
            )
            .await
        }
    }
}
