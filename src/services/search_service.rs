//! Search service - natural-language lookup of video frames.
//!
//! This service handles:
//! - Embedding the query text
//! - Nearest-neighbour lookup in the video context index
//! - Locating the heavy range of the best video
//! - Cutting that range out of the source footage with ffmpeg

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::clients::openai::OpenAiClient;
use crate::clients::pinecone::{PineconeClient, QueryRequest};
use crate::error::AppError;
use crate::models::context::ContextKind;
use crate::models::matches::{self, DEFAULT_INTERVAL, HeavyRange, QueryMatch};
use crate::services::ffmpeg;

/// Default number of matches requested from the index.
pub const DEFAULT_TOP_K: u32 = 3;

/// Parameters of one search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub query: String,
    pub top_k: u32,
    pub index_name: String,
    /// Compute the heavy range of the matches.
    pub heavy_range: bool,
    pub interval: usize,
    /// Write the heavy range clip here (implies `heavy_range`).
    pub dump_path: Option<PathBuf>,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: DEFAULT_TOP_K,
            index_name: ContextKind::Video.index_name().to_string(),
            heavy_range: false,
            interval: DEFAULT_INTERVAL,
            dump_path: None,
        }
    }
}

/// Result of a search, printed by the `search` command.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub matches: Vec<QueryMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<HeavyRange>,
}

/// Search the video context index for `options.query`.
///
/// # Process
///
/// 1. Validate the query
/// 2. Embed it with the same model the index was built with
/// 3. Query the index for `top_k` matches with metadata
/// 4. Optionally compute the heavy range over the matches
///
/// Clip extraction is left to [`extract_clip`] so callers decide where ffmpeg runs.
///
/// # Errors
///
/// - `InvalidRequest`: Empty query, `top_k` of zero, or a heavy range
///   requested from an index other than the video index
/// - `IndexNotFound`: The index has not been built
/// - `NoMatches`: A heavy range was requested but no match names a frame
/// - `Api` / `Http`: Remote failures
pub async fn search(
    openai: &OpenAiClient,
    pinecone: &PineconeClient,
    options: &SearchOptions,
) -> Result<SearchOutcome, AppError> {
    let query = options.query.as_str();
    if query.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "Query must not be empty".to_string(),
        ));
    }
    if options.top_k == 0 {
        return Err(AppError::InvalidRequest(
            "top_k must be at least 1".to_string(),
        ));
    }
    let wants_range = options.heavy_range || options.dump_path.is_some();
    if wants_range && options.index_name != ContextKind::Video.index_name() {
        return Err(AppError::InvalidRequest(format!(
            "heavy range needs frame matches from `{}`, not `{}`",
            ContextKind::Video.index_name(),
            options.index_name
        )));
    }

    let embedding = openai.embed(query).await?;
    tracing::debug!(dimension = embedding.len(), "Query embedded");

    let index = pinecone.index(&options.index_name).await?;
    let matches = index
        .query(&QueryRequest::with_metadata(embedding, options.top_k))
        .await?;
    tracing::info!(index = %options.index_name, matches = matches.len(), "Search complete");

    let range = if wants_range {
        Some(matches::heavy_range(&matches, options.interval)?)
    } else {
        None
    };

    Ok(SearchOutcome {
        query: query.to_string(),
        matches,
        range,
    })
}

/// Copy `range` out of its source video into `dump_path` without re-encoding.
///
/// Runs `ffmpeg -y -i <video> -ss <start> -to <end> -c copy <dump_path>`.
///
/// # Errors
///
/// - `InvalidRequest`: The source video does not exist
/// - `Spawn`: ffmpeg could not be started
/// - `Ffmpeg`: ffmpeg exited with a failure status
pub async fn extract_clip(ffmpeg_bin: &str, range: &HeavyRange, dump_path: &Path) -> Result<(), AppError> {
    if !range.video.is_file() {
        return Err(AppError::InvalidRequest(format!(
            "Source video {} does not exist",
            range.video.display()
        )));
    }

    tracing::info!(
        video = %range.video.display(),
        start = %range.start_timestamp(),
        end = %range.end_timestamp(),
        "Extracting clip"
    );

    let (start, end) = (range.start_timestamp(), range.end_timestamp());
    let args: [&OsStr; 10] = [
        "-y".as_ref(),
        "-i".as_ref(),
        range.video.as_os_str(),
        "-ss".as_ref(),
        start.as_ref(),
        "-to".as_ref(),
        end.as_ref(),
        "-c".as_ref(),
        "copy".as_ref(),
        dump_path.as_os_str(),
    ];
    ffmpeg::run(ffmpeg_bin, args).await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn range_in(dir: &Path) -> HeavyRange {
        HeavyRange {
            video: dir.join("IMG_0001.MOV"),
            start: 8,
            end: 12,
        }
    }

    #[tokio::test]
    async fn missing_source_video_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let err = extract_clip("true", &range_in(tmp.path()), &tmp.path().join("clip.MOV"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn ffmpeg_failure_reports_its_status() {
        let tmp = tempfile::tempdir().unwrap();
        let range = range_in(tmp.path());
        std::fs::write(&range.video, b"").unwrap();

        let err = extract_clip("false", &range, &tmp.path().join("clip.MOV"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Ffmpeg(1)));

        extract_clip("true", &range, &tmp.path().join("clip.MOV")).await.unwrap();
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_a_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let range = range_in(tmp.path());
        std::fs::write(&range.video, b"").unwrap();

        let err = extract_clip("/nonexistent/ffmpeg", &range, &tmp.path().join("clip.MOV"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 127);
    }
}
