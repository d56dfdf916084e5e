//! `context`: generate frame descriptions or transcript summaries for a workspace.

use std::path::Path;
use std::process::ExitCode;

use crate::cli::ContextArgs;
use crate::clients::OpenAiClient;
use crate::config::Config;
use crate::error::AppError;
use crate::services::context_service;

pub async fn run(env_file: Option<&Path>, args: ContextArgs) -> Result<ExitCode, AppError> {
    let config = Config::load(env_file)?;
    let openai = OpenAiClient::from_config(&config)?;

    let report = context_service::generate_context(
        &openai,
        &config.ffmpeg_bin,
        args.kind,
        &args.workspace,
        args.temperature,
    )
    .await?;

    if args.json {
        super::print_json(&report)?;
    } else {
        println!(
            "{} videos: {} records written, {} already done",
            report.videos, report.written, report.skipped
        );
    }

    Ok(ExitCode::SUCCESS)
}
