//! CLI command handlers.
//!
//! Each handler turns parsed arguments into service calls and prints the
//! result to stdout. Logging goes to stderr, so stdout stays parseable.

pub mod context;
pub mod index;
pub mod launch;
pub mod queries;
pub mod search;

use std::path::Path;
use std::process::ExitCode;

use serde::Serialize;

use crate::cli::{Cli, Commands, LaunchArgs};
use crate::clients::{OpenAiClient, PineconeClient};
use crate::config::Config;
use crate::error::AppError;

/// Dispatch `cli` to its handler.
///
/// A bare invocation runs `launch` with its defaults, like the original run script.
pub async fn run(cli: Cli) -> Result<ExitCode, AppError> {
    let env_file = cli.env_file.as_deref();
    match cli.command {
        None => launch::run(env_file, LaunchArgs::default()).await,
        Some(Commands::Launch(args)) => launch::run(env_file, args).await,
        Some(Commands::Search(args)) => search::run(env_file, args).await,
        Some(Commands::Context(args)) => context::run(env_file, args).await,
        Some(Commands::Index(args)) => index::run(env_file, args).await,
        Some(Commands::Queries(args)) => queries::run(env_file, args).await,
    }
}

/// Configuration plus both remote clients, for the commands that need them.
pub(crate) fn remote_clients(env_file: Option<&Path>) -> Result<(Config, OpenAiClient, PineconeClient), AppError> {
    let config = Config::load(env_file)?;
    tracing::info!("Configuration loaded");
    let openai = OpenAiClient::from_config(&config)?;
    let pinecone = PineconeClient::from_config(&config)?;
    Ok((config, openai, pinecone))
}

pub(crate) fn print_json<T: Serialize>(data: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}
