//! vlog-search - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Initialize logging (stderr, `RUST_LOG`, defaults to "info")
//! 2. Parse the command line
//! 3. Run the selected command (`launch` when none is given)
//! 4. Exit with the command's status, or the error's exit code

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use vlog_search::{cli::Cli, commands};

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so the launched module and JSON output own stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match commands::run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::from(err.exit_code())
        }
    }
}
