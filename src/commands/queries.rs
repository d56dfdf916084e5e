//! `queries`: generate retrieval queries from a video script.

use std::path::Path;
use std::process::ExitCode;

use crate::cli::QueriesArgs;
use crate::clients::OpenAiClient;
use crate::config::Config;
use crate::error::AppError;
use crate::services::query_service;

pub async fn run(env_file: Option<&Path>, args: QueriesArgs) -> Result<ExitCode, AppError> {
    let config = Config::load(env_file)?;
    let openai = OpenAiClient::from_config(&config)?;

    let (path, queries) =
        query_service::generate_queries(&openai, &args.script_path, args.temperature).await?;
    println!("{} queries have been saved to {}.", queries.len(), path.display());

    Ok(ExitCode::SUCCESS)
}
