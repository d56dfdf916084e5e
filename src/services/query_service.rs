//! Query service - turns a video script into retrieval queries.

use std::path::{Path, PathBuf};

use crate::clients::openai::{ChatMessage, OpenAiClient};
use crate::error::AppError;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that generates concise, natural language queries \
for AI-powered video retrieval. Provide your final output in an array of query strings braced by \"[]\", no additional keys.";

/// Generate queries for the script at `script_path` and write them next to it.
///
/// # Process
///
/// 1. Read the script
/// 2. Ask the chat model for a bracketed array of queries
/// 3. Extract the array from the reply
/// 4. Write it as JSON to [`queries_path`]
///
/// # Returns
///
/// The written path and the queries
///
/// # Errors
///
/// - `InvalidRequest`: Script missing or empty
/// - `Json`: The reply's array is not a JSON list of strings
pub async fn generate_queries(
    openai: &OpenAiClient,
    script_path: &Path,
    temperature: f32,
) -> Result<(PathBuf, Vec<String>), AppError> {
    if !script_path.is_file() {
        return Err(AppError::InvalidRequest(format!(
            "Script {} does not exist",
            script_path.display()
        )));
    }

    let script = tokio::fs::read_to_string(script_path).await?;
    if script.trim().is_empty() {
        return Err(AppError::InvalidRequest("Script is empty".to_string()));
    }

    let messages = [
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Given the following script for a video, generate a list of concise, natural language queries \
             that can be used for AI-powered video retrieval. Each query should directly describe a moment \
             in the video. The queries should be structured as if they are directly describing what is \
             happening in the footage. Script: {}",
            script
        )),
    ];
    let reply = openai.chat(&messages, temperature).await?;
    let queries = extract_queries(&reply)?;

    let output = queries_path(script_path);
    tokio::fs::write(&output, serde_json::to_vec(&queries)?).await?;
    tracing::info!(path = %output.display(), count = queries.len(), "Queries saved");

    Ok((output, queries))
}

/// Pull the outermost `[...]` out of a model reply and parse it.
///
/// Replies often wrap the array in prose or a code fence. A reply with no
/// brackets yields no queries.
pub fn extract_queries(reply: &str) -> Result<Vec<String>, AppError> {
    let (Some(open), Some(close)) = (reply.find('['), reply.rfind(']')) else {
        return Ok(Vec::new());
    };
    if close < open {
        return Ok(Vec::new());
    }

    Ok(serde_json::from_str(&reply[open..=close])?)
}

/// `<dir>/<stem>_queries.json` for a script at `<dir>/<stem>.<ext>`.
pub fn queries_path(script_path: &Path) -> PathBuf {
    let stem = script_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    script_path.with_file_name(format!("{}_queries.json", stem))
}
