//! Search results and the frame-range heuristic built on them.
//!
//! Video context records are stored with ids of the form
//! `<workspace>/video_context/<video>/frame_<NNNN>.txt`, one frame per second
//! of footage. A match id therefore names both the source video and the
//! second it was sampled at.

use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Directory holding per-frame descriptions inside a workspace.
pub const VIDEO_CONTEXT_DIR: &str = "video_context";

/// Directory holding the original footage inside a workspace.
pub const SOURCE_DIR: &str = "source";

/// Extension of the source footage.
pub const VIDEO_EXTENSION: &str = "MOV";

/// Default width, in frames (seconds), of the heavy range window.
pub const DEFAULT_INTERVAL: usize = 4;

/// Highest frame number accepted from a match id: 24 hours of footage.
pub const MAX_FRAME: u32 = 86_400;

/// One match returned by the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryMatch {
    pub id: String,

    #[serde(default)]
    pub score: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl QueryMatch {
    /// Stored text of the match: a frame `description` or a transcript `summary`.
    pub fn text(&self) -> Option<&str> {
        let metadata = self.metadata.as_ref()?;
        ["description", "summary"]
            .iter()
            .find_map(|key| metadata.get(*key).and_then(|v| v.as_str()))
    }
}

/// A frame of a source video, parsed from a match id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef {
    /// Path of the source video without extension.
    pub video: PathBuf,
    /// Frame number, equal to the offset in seconds.
    pub frame: u32,
}

impl FrameRef {
    /// Parse a `.../video_context/<video>/frame_<NNNN>.txt` id.
    ///
    /// The `video_context` component of the parent is replaced by `source`,
    /// turning the context directory into the source video path.
    /// Returns `None` for ids that do not follow the frame naming, or whose
    /// frame number exceeds [`MAX_FRAME`].
    pub fn parse(id: &str) -> Option<Self> {
        let path = Path::new(id);
        let frame = path
            .file_stem()?
            .to_str()?
            .strip_prefix("frame_")?
            .parse()
            .ok()
            .filter(|&frame| frame <= MAX_FRAME)?;

        let parent = path.parent()?;
        if parent.as_os_str().is_empty() {
            return None;
        }
        let video = parent
            .components()
            .map(|c| match c {
                Component::Normal(name) if name == VIDEO_CONTEXT_DIR => Component::Normal(OsStr::new(SOURCE_DIR)),
                other => other,
            })
            .collect();

        Some(Self { video, frame })
    }
}

/// Window of a source video holding the most retrieved frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeavyRange {
    /// Source video file, extension included.
    pub video: PathBuf,
    /// Window start, in seconds.
    pub start: u64,
    /// Window end (exclusive), in seconds.
    pub end: u64,
}

impl HeavyRange {
    pub fn start_timestamp(&self) -> String {
        format_timestamp(self.start)
    }

    pub fn end_timestamp(&self) -> String {
        format_timestamp(self.end)
    }
}

/// Find the window of `interval` frames containing most retrieved frames.
///
/// # Algorithm
///
/// 1. Group parseable match ids by source video
/// 2. Keep the video with the most frames (first seen wins ties)
/// 3. Histogram its frame numbers into a buffer of `max + 1` slots
/// 4. Slide the window over starts `1 .. len - interval` and keep the first best sum
///
/// If no window fits, or none has a frame in it, the range starts at 0.
///
/// # Errors
///
/// - `InvalidRequest` if `interval` is 0
/// - `NoMatches` if no match id names a frame
pub fn heavy_range(matches: &[QueryMatch], interval: usize) -> Result<HeavyRange, AppError> {
    if interval == 0 {
        return Err(AppError::InvalidRequest(
            "interval must be at least one frame".to_string(),
        ));
    }

    let mut groups: Vec<(PathBuf, Vec<u32>)> = Vec::new();
    for item in matches {
        let Some(frame) = FrameRef::parse(&item.id) else {
            tracing::warn!(id = %item.id, "Skipping match that does not name a frame");
            continue;
        };
        match groups.iter_mut().find(|(video, _)| *video == frame.video) {
            Some((_, frames)) => frames.push(frame.frame),
            None => groups.push((frame.video, vec![frame.frame])),
        }
    }

    let mut best: Option<&(PathBuf, Vec<u32>)> = None;
    for group in &groups {
        if best.is_none_or(|b| group.1.len() > b.1.len()) {
            best = Some(group);
        }
    }
    let (video, frames) = best.ok_or(AppError::NoMatches)?;

    let max = frames.iter().copied().max().unwrap_or_default() as usize;
    let mut buffer = vec![0usize; max + 1];
    for &frame in frames {
        buffer[frame as usize] += 1;
    }

    let (mut start, mut count) = (0usize, 0usize);
    for i in 1..buffer.len().saturating_sub(interval) {
        let sum: usize = buffer[i..i + interval].iter().sum();
        if sum > count {
            start = i;
            count = sum;
        }
    }

    let mut file: OsString = video.clone().into_os_string();
    file.push(".");
    file.push(VIDEO_EXTENSION);

    Ok(HeavyRange {
        video: PathBuf::from(file),
        start: start as u64,
        end: (start + interval) as u64,
    })
}

/// Format seconds as `H:MM:SS`, the form ffmpeg accepts for `-ss` / `-to`.
pub fn format_timestamp(seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str) -> QueryMatch {
        QueryMatch {
            id: id.to_string(),
            score: 0.5,
            metadata: None,
        }
    }

    #[test]
    fn parses_frame_ids() {
        let frame = FrameRef::parse("ws/video_context/IMG_0001/frame_0042.txt").unwrap();
        assert_eq!(frame.video, PathBuf::from("ws/source/IMG_0001"));
        assert_eq!(frame.frame, 42);
    }

    #[test]
    fn rejects_ids_without_frames() {
        assert_eq!(FrameRef::parse("ws/audio_transcripts/IMG_0001/0-4.json"), None);
        assert_eq!(FrameRef::parse("frame_0001.txt"), None);
        assert_eq!(FrameRef::parse("ws/video_context/IMG_0001/frame_x.txt"), None);
    }

    #[test]
    fn frame_numbers_beyond_a_day_are_rejected() {
        assert!(FrameRef::parse("ws/video_context/IMG_0001/frame_86400.txt").is_some());
        assert_eq!(FrameRef::parse("ws/video_context/IMG_0001/frame_86401.txt"), None);
        assert_eq!(FrameRef::parse("ws/video_context/IMG_0001/frame_4000000000.txt"), None);

        let matches = vec![
            hit("ws/video_context/IMG_0001/frame_4000000000.txt"),
            hit("ws/video_context/IMG_0001/frame_0003.txt"),
        ];
        let range = heavy_range(&matches, 1).unwrap();
        assert_eq!((range.start, range.end), (0, 1));
    }

    #[test]
    fn picks_window_with_most_frames_of_busiest_video() {
        let matches = vec![
            hit("ws/video_context/IMG_0001/frame_0005.txt"),
            hit("ws/video_context/IMG_0002/frame_0003.txt"),
            hit("ws/video_context/IMG_0001/frame_0006.txt"),
            hit("ws/video_context/IMG_0001/frame_0007.txt"),
            hit("ws/video_context/IMG_0001/frame_0012.txt"),
        ];

        let range = heavy_range(&matches, DEFAULT_INTERVAL).unwrap();
        assert_eq!(range.video, PathBuf::from("ws/source/IMG_0001.MOV"));
        assert_eq!((range.start, range.end), (4, 8));
        assert_eq!(range.start_timestamp(), "0:00:04");
        assert_eq!(range.end_timestamp(), "0:00:08");
    }

    #[test]
    fn first_video_wins_a_tie() {
        let matches = vec![
            hit("ws/video_context/B/frame_0001.txt"),
            hit("ws/video_context/A/frame_0001.txt"),
        ];
        let range = heavy_range(&matches, 1).unwrap();
        assert_eq!(range.video, PathBuf::from("ws/source/B.MOV"));
    }

    #[test]
    fn short_videos_start_at_zero() {
        let matches = vec![hit("ws/video_context/IMG/frame_0002.txt")];
        let range = heavy_range(&matches, DEFAULT_INTERVAL).unwrap();
        assert_eq!((range.start, range.end), (0, 4));
    }

    #[test]
    fn unparseable_matches_only_is_no_matches() {
        let err = heavy_range(&[hit("summary-7")], DEFAULT_INTERVAL).unwrap_err();
        assert!(matches!(err, AppError::NoMatches));
        let err = heavy_range(&[], DEFAULT_INTERVAL).unwrap_err();
        assert!(matches!(err, AppError::NoMatches));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = heavy_range(&[hit("ws/video_context/IMG/frame_0002.txt")], 0).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn timestamps_roll_over_to_hours() {
        assert_eq!(format_timestamp(0), "0:00:00");
        assert_eq!(format_timestamp(75), "0:01:15");
        assert_eq!(format_timestamp(3_661), "1:01:01");
    }

    #[test]
    fn text_prefers_description_then_summary() {
        let mut with_summary = hit("x");
        with_summary.metadata = serde_json::json!({ "summary": "talking about pizza" })
            .as_object()
            .cloned();
        assert_eq!(with_summary.text(), Some("talking about pizza"));
        assert_eq!(hit("x").text(), None);
    }
}
