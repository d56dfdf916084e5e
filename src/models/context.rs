//! Context records: the per-frame descriptions and per-segment transcript
//! summaries a workspace holds, and how each kind is indexed.
//!
//! # Workspace Layout
//!
//! ```text
//! <workspace>/
//!   source/<video>.MOV
//!   video_context/<video>/frame_0001.txt      plain-text frame description
//!   audio_transcripts/<video>/0-4.json        {"summary": "...", "raw_text": "..."}
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::AppError;

/// Which half of the workspace an index is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    Video,
    Audio,
}

impl ContextKind {
    /// Pinecone index holding this kind.
    pub fn index_name(self) -> &'static str {
        match self {
            ContextKind::Video => "video-context",
            ContextKind::Audio => "audio-context",
        }
    }

    /// Workspace subdirectory holding this kind's records.
    pub fn folder(self) -> &'static str {
        match self {
            ContextKind::Video => "video_context",
            ContextKind::Audio => "audio_transcripts",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ContextKind::Video => "txt",
            ContextKind::Audio => "json",
        }
    }

    /// Metadata key the embedded text is stored under.
    pub fn metadata_key(self) -> &'static str {
        match self {
            ContextKind::Video => "description",
            ContextKind::Audio => "summary",
        }
    }
}

/// On-disk shape of an audio transcript segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub raw_text: String,
}

/// A record ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRecord {
    /// Vector id: the record's file path.
    pub id: String,
    pub kind: ContextKind,
    pub text: String,
}

impl ContextRecord {
    /// Read the record at `path`.
    ///
    /// Video records embed the whole file; audio records embed the `summary`
    /// field of the segment JSON.
    pub fn load(kind: ContextKind, path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)?;
        let text = match kind {
            ContextKind::Video => content,
            ContextKind::Audio => serde_json::from_str::<TranscriptRecord>(&content)?.summary,
        };

        Ok(Self {
            id: path.to_string_lossy().into_owned(),
            kind,
            text,
        })
    }

    /// Pinecone metadata for this record.
    pub fn metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            self.kind.metadata_key().to_string(),
            serde_json::Value::String(self.text.clone()),
        );
        metadata
    }
}

/// All record files of `kind` below `workspace`, sorted by path.
///
/// # Errors
///
/// Returns `InvalidRequest` if the workspace or its context folder does not exist.
pub fn collect_records(kind: ContextKind, workspace: &Path) -> Result<Vec<PathBuf>, AppError> {
    if !workspace.is_dir() {
        return Err(AppError::InvalidRequest(format!(
            "workspace {} does not exist",
            workspace.display()
        )));
    }

    let folder = workspace.join(kind.folder());
    if !folder.is_dir() {
        return Err(AppError::InvalidRequest(format!(
            "context folder {} does not exist",
            folder.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&folder) {
        let entry = entry.map_err(|e| AppError::Io(e.into()))?;
        let is_record = entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == kind.extension());
        if is_record {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}
