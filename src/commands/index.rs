//! `index`: build the video or audio index from a workspace.

use std::path::Path;
use std::process::ExitCode;

use crate::cli::IndexArgs;
use crate::error::AppError;
use crate::services::index_service;

pub async fn run(env_file: Option<&Path>, args: IndexArgs) -> Result<ExitCode, AppError> {
    let (config, openai, pinecone) = super::remote_clients(env_file)?;

    let report = index_service::build_index(
        &openai,
        &pinecone,
        args.kind,
        &args.workspace,
        config.index_ready_timeout(),
    )
    .await?;

    if args.json {
        super::print_json(&report)?;
    } else {
        println!(
            "{}: {} indexed, {} skipped{}",
            report.index,
            report.indexed,
            report.skipped,
            if report.created { " (index created)" } else { "" }
        );
    }

    Ok(ExitCode::SUCCESS)
}
