// SPDX-FileCopyrightText: 2026 Talkrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Talkrelay - a bidirectional relay between Matrix rooms and a polling
//! remote messaging backend.
//!
//! This is the binary entry point.

mod check;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Talkrelay - relays messages between Matrix rooms and a remote backend.
#[derive(Parser, Debug)]
#[command(name = "talkrelay", version, about, long_about = None)]
struct Cli {
    /// Additional configuration file, layered over the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the relay (default).
    Serve,
    /// Load and validate the configuration, then print a summary.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match talkrelay_config::load_and_validate_path(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            talkrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => check::print_summary(&config),
    }
}
