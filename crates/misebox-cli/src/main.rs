//! Misebox CLI - interactive shell over the Misebox client core
//!
//! Sign in, edit the profile and walk the navigation from the terminal.

mod auth;
mod cli;
mod commands;
mod error;
mod paths;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::shell::run_shell;
use crate::error::CliError;
use crate::paths::{resolve_config_path, resolve_store_path};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "misebox=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config)?;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let store_path = resolve_store_path(cli.store)?;
            run_shell(&config_path, store_path, cli.offline).await?;
        }
        Commands::Config { command } => run_config(command, &config_path)?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
