//! Context service - turns source footage into the records the indexes read.
//!
//! # Workspace Layout
//!
//! ```text
//! <workspace>/
//!   source/<video>.MOV                              input footage
//!   video_keyframes/<video>/frame_0001.jpg          one frame per second, quarter resolution
//!   video_context/<video>/frame_0001.txt            description of each frame
//!   audio/<video>.mp3                               extracted soundtrack
//!   audio_transcripts/<video>/<start>-<end>.json    summary of each transcript segment
//! ```
//!
//! Each per-video stage is skipped when its output already exists. A stage
//! that fails removes its partial output, so a rerun starts it over.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use crate::clients::openai::{ChatMessage, OpenAiClient, TranscriptSegment};
use crate::error::AppError;
use crate::models::context::{ContextKind, TranscriptRecord};
use crate::models::matches::{SOURCE_DIR, VIDEO_EXTENSION};
use crate::services::ffmpeg;

/// Frame descriptions in flight at once.
pub const MAX_CONCURRENT_DESCRIPTIONS: usize = 2;

pub const DEFAULT_SUMMARY_TEMPERATURE: f32 = 0.0;

/// The chat API's own default; descriptions are not tuned.
const DESCRIPTION_TEMPERATURE: f32 = 1.0;

pub const KEYFRAMES_DIR: &str = "video_keyframes";

pub const AUDIO_DIR: &str = "audio";

/// One frame per second, downsampled to a quarter of the resolution.
const KEYFRAME_FILTER: &str = "fps=1,scale=iw/4:ih/4";

const DESCRIBE_PROMPT: &str = "Generate a concise description of the image, highlighting key objects \
and features for easy searchability.";

const SUMMARIZE_PROMPT: &str = "Generate a concise description of this transcript, highlighting keywords \
for easy searchability:";

/// Outcome of a context run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextReport {
    pub kind: ContextKind,
    pub videos: usize,
    /// Videos whose context already existed.
    pub skipped: usize,
    /// Frame descriptions or transcript segments written.
    pub written: usize,
}

impl ContextReport {
    fn new(kind: ContextKind, videos: usize) -> Self {
        Self {
            kind,
            videos,
            skipped: 0,
            written: 0,
        }
    }
}

/// Generate the `kind` context of every source video in `workspace`.
///
/// `temperature` applies to transcript summaries only.
pub async fn generate_context(
    openai: &OpenAiClient,
    ffmpeg_bin: &str,
    kind: ContextKind,
    workspace: &Path,
    temperature: f32,
) -> Result<ContextReport, AppError> {
    match kind {
        ContextKind::Video => generate_video_context(openai, ffmpeg_bin, workspace).await,
        ContextKind::Audio => generate_audio_context(openai, ffmpeg_bin, workspace, temperature).await,
    }
}

/// Describe one frame per second of every source video.
///
/// # Process
///
/// 1. Extract keyframes with ffmpeg, unless `video_keyframes/<video>` exists
/// 2. Skip the video if `video_context/<video>` exists
/// 3. Describe every keyframe with the chat model, at most
///    [`MAX_CONCURRENT_DESCRIPTIONS`] at a time
///
/// # Errors
///
/// - `InvalidRequest`: Workspace or source folder missing
/// - `Spawn` / `Ffmpeg`: Keyframe extraction failed
/// - `ContextIncomplete`: At least one frame of a video could not be described
pub async fn generate_video_context(
    openai: &OpenAiClient,
    ffmpeg_bin: &str,
    workspace: &Path,
) -> Result<ContextReport, AppError> {
    let videos = source_videos(workspace)?;
    let keyframes_root = workspace.join(KEYFRAMES_DIR);
    let context_root = workspace.join(ContextKind::Video.folder());
    tokio::fs::create_dir_all(&keyframes_root).await?;
    tokio::fs::create_dir_all(&context_root).await?;

    let mut report = ContextReport::new(ContextKind::Video, videos.len());
    for video in &videos {
        let Some(stem) = video.file_stem() else {
            continue;
        };

        let frames = extract_keyframes(ffmpeg_bin, video, &keyframes_root.join(stem)).await?;

        let context_dir = context_root.join(stem);
        if context_dir.exists() {
            tracing::info!(dir = %context_dir.display(), "Frame descriptions exist, skipping");
            report.skipped += 1;
            continue;
        }

        report.written += describe_frames(openai, &frames, &context_dir).await?;
    }

    tracing::info!(videos = report.videos, written = report.written, "Video context ready");
    Ok(report)
}

async fn extract_keyframes(ffmpeg_bin: &str, video: &Path, dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !dir.exists() {
        tracing::info!(video = %video.display(), "Extracting frames");
        tokio::fs::create_dir_all(dir).await?;

        let pattern = dir.join("frame_%04d.jpg");
        let args: [&OsStr; 5] = [
            "-i".as_ref(),
            video.as_os_str(),
            "-vf".as_ref(),
            KEYFRAME_FILTER.as_ref(),
            pattern.as_os_str(),
        ];
        if let Err(e) = ffmpeg::run(ffmpeg_bin, args).await {
            let _ = tokio::fs::remove_dir_all(dir).await;
            return Err(e);
        }
    }

    files_with_extension(dir, "jpg")
}

async fn describe_frames(openai: &OpenAiClient, frames: &[PathBuf], context_dir: &Path) -> Result<usize, AppError> {
    tracing::info!(dir = %context_dir.display(), frames = frames.len(), "Describing key frames");
    tokio::fs::create_dir_all(context_dir).await?;

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DESCRIPTIONS));
    let mut tasks = JoinSet::new();
    for frame in frames {
        let openai = openai.clone();
        let semaphore = Arc::clone(&semaphore);
        let frame = frame.clone();
        let context_dir = context_dir.to_path_buf();
        tasks.spawn(async move {
            let outcome = describe_frame(&openai, &semaphore, &frame, &context_dir).await;
            (frame, outcome)
        });
    }

    let (mut written, mut failed) = (0, 0);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => written += 1,
            Ok((frame, Err(e))) => {
                tracing::error!(frame = %frame.display(), "Failed to describe frame: {}", e);
                failed += 1;
            }
            Err(e) => {
                tracing::error!("Description task aborted: {}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        let _ = tokio::fs::remove_dir_all(context_dir).await;
        return Err(AppError::ContextIncomplete {
            failed,
            total: frames.len(),
        });
    }
    Ok(written)
}

async fn describe_frame(
    openai: &OpenAiClient,
    semaphore: &Semaphore,
    frame: &Path,
    context_dir: &Path,
) -> Result<(), AppError> {
    let stem = frame
        .file_stem()
        .ok_or_else(|| AppError::InvalidRequest(format!("frame {} has no name", frame.display())))?;
    let image = tokio::fs::read(frame).await?;

    let description = {
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("description limiter closed: {}", e)))?;
        tracing::info!(frame = %frame.display(), "Describing frame");
        let messages = [ChatMessage::system(DESCRIBE_PROMPT), ChatMessage::user_jpeg(&image)];
        openai.chat(&messages, DESCRIPTION_TEMPERATURE).await?
    };

    tokio::fs::write(context_dir.join(with_suffix(stem, ".txt")), description).await?;
    Ok(())
}

/// Transcribe and summarize the soundtrack of every source video.
///
/// # Process
///
/// 1. Extract the soundtrack to `audio/<video>.mp3`, unless it exists
/// 2. Skip the video if `audio_transcripts/<video>` exists
/// 3. Transcribe it with segment timestamps
/// 4. Summarize each segment in turn and write `<start>-<end>.json`
///
/// # Errors
///
/// - `InvalidRequest`: Workspace or source folder missing
/// - `Spawn` / `Ffmpeg`: Audio extraction failed
/// - `Api` / `Http`: Transcription or a summary failed
pub async fn generate_audio_context(
    openai: &OpenAiClient,
    ffmpeg_bin: &str,
    workspace: &Path,
    temperature: f32,
) -> Result<ContextReport, AppError> {
    let videos = source_videos(workspace)?;
    let audio_root = workspace.join(AUDIO_DIR);
    let transcripts_root = workspace.join(ContextKind::Audio.folder());
    tokio::fs::create_dir_all(&audio_root).await?;
    tokio::fs::create_dir_all(&transcripts_root).await?;

    let mut report = ContextReport::new(ContextKind::Audio, videos.len());
    for video in &videos {
        let Some(stem) = video.file_stem() else {
            continue;
        };

        let audio_file = audio_root.join(with_suffix(stem, ".mp3"));
        extract_audio(ffmpeg_bin, video, &audio_file).await?;

        let transcript_dir = transcripts_root.join(stem);
        if transcript_dir.exists() {
            tracing::info!(dir = %transcript_dir.display(), "Transcript exists, skipping");
            report.skipped += 1;
            continue;
        }

        tracing::info!(audio = %audio_file.display(), "Transcribing audio");
        let transcription = openai.transcribe(&audio_file).await?;

        tokio::fs::create_dir_all(&transcript_dir).await?;
        match summarize_segments(openai, &transcription.segments, &transcript_dir, temperature).await {
            Ok(written) => report.written += written,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&transcript_dir).await;
                return Err(e);
            }
        }
    }

    tracing::info!(videos = report.videos, written = report.written, "Audio context ready");
    Ok(report)
}

async fn extract_audio(ffmpeg_bin: &str, video: &Path, audio_file: &Path) -> Result<(), AppError> {
    if audio_file.exists() {
        return Ok(());
    }

    tracing::info!(video = %video.display(), "Extracting audio");
    let args: [&OsStr; 4] = ["-i".as_ref(), video.as_os_str(), "-vn".as_ref(), audio_file.as_os_str()];
    if let Err(e) = ffmpeg::run(ffmpeg_bin, args).await {
        let _ = tokio::fs::remove_file(audio_file).await;
        return Err(e);
    }
    Ok(())
}

async fn summarize_segments(
    openai: &OpenAiClient,
    segments: &[TranscriptSegment],
    transcript_dir: &Path,
    temperature: f32,
) -> Result<usize, AppError> {
    for segment in segments {
        let messages = [
            ChatMessage::system(SUMMARIZE_PROMPT),
            ChatMessage::user(segment.text.clone()),
        ];
        let summary = openai.chat(&messages, temperature).await?;

        let record = TranscriptRecord {
            summary: summary.trim().to_string(),
            raw_text: segment.text.clone(),
        };
        let path = transcript_dir.join(segment_file_name(segment.start, segment.end));
        tokio::fs::write(&path, serde_json::to_string_pretty(&record)?).await?;
        tracing::debug!(path = %path.display(), "Segment saved");
    }
    Ok(segments.len())
}

/// `<start>-<end>.json`, with both offsets rounded to whole seconds (ties to even).
pub fn segment_file_name(start: f64, end: f64) -> String {
    format!(
        "{}-{}.json",
        start.round_ties_even() as u64,
        end.round_ties_even() as u64
    )
}

/// Source videos of `workspace`, sorted by path.
///
/// # Errors
///
/// Returns `InvalidRequest` if the workspace or its source folder does not exist.
pub fn source_videos(workspace: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !workspace.is_dir() {
        return Err(AppError::InvalidRequest(format!(
            "workspace {} does not exist",
            workspace.display()
        )));
    }

    let source = workspace.join(SOURCE_DIR);
    if !source.is_dir() {
        return Err(AppError::InvalidRequest(format!(
            "source folder {} does not exist",
            source.display()
        )));
    }

    files_with_extension(&source, VIDEO_EXTENSION)
}

fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| AppError::Io(e.into()))?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == extension) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn with_suffix(stem: &OsStr, suffix: &str) -> OsString {
    let mut name = stem.to_os_string();
    name.push(suffix);
    name
}
