//! `search`: embed a query and look it up in the index.

use std::path::Path;
use std::process::ExitCode;

use crate::cli::SearchArgs;
use crate::error::AppError;
use crate::services::search_service::{self, SearchOptions, SearchOutcome};

pub async fn run(env_file: Option<&Path>, args: SearchArgs) -> Result<ExitCode, AppError> {
    let (config, openai, pinecone) = super::remote_clients(env_file)?;

    let options = SearchOptions {
        query: args.query,
        top_k: args.top_k,
        index_name: args.index.index_name().to_string(),
        heavy_range: args.heavy_range,
        interval: args.interval,
        dump_path: args.dump_path,
    };
    let outcome = search_service::search(&openai, &pinecone, &options).await?;

    if args.json {
        super::print_json(&outcome)?;
    } else {
        println!("{}", render(&outcome));
    }

    if let (Some(range), Some(dump)) = (&outcome.range, &options.dump_path) {
        search_service::extract_clip(&config.ffmpeg_bin, range, dump).await?;
        if !args.json {
            println!("clip written to {}", dump.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Plain-text rendering: one `score  id` line per match, its stored text indented below.
pub fn render(outcome: &SearchOutcome) -> String {
    let mut lines = Vec::new();
    if outcome.matches.is_empty() {
        lines.push("no matches".to_string());
    }
    for m in &outcome.matches {
        lines.push(format!("{:.4}  {}", m.score, m.id));
        if let Some(text) = m.text() {
            let first = text.lines().next().unwrap_or_default();
            lines.push(format!("        {}", first));
        }
    }
    if let Some(range) = &outcome.range {
        lines.push(format!(
            "heavy range: {} {} -> {}",
            range.video.display(),
            range.start_timestamp(),
            range.end_timestamp()
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matches::{HeavyRange, QueryMatch};
    use std::path::PathBuf;

    #[test]
    fn renders_matches_and_range() {
        let outcome = SearchOutcome {
            query: "pizza".to_string(),
            matches: vec![QueryMatch {
                id: "ws/video_context/IMG/frame_0004.txt".to_string(),
                score: 0.81234,
                metadata: serde_json::json!({ "description": "A man holds a pizza.\nMore detail." })
                    .as_object()
                    .cloned(),
            }],
            range: Some(HeavyRange {
                video: PathBuf::from("ws/source/IMG.MOV"),
                start: 4,
                end: 8,
            }),
        };

        assert_eq!(
            render(&outcome),
            "0.8123  ws/video_context/IMG/frame_0004.txt\n        A man holds a pizza.\nheavy range: ws/source/IMG.MOV 0:00:04 -> 0:00:08"
        );
    }

    #[test]
    fn renders_empty_results() {
        let outcome = SearchOutcome {
            query: "pizza".to_string(),
            matches: Vec::new(),
            range: None,
        };
        assert_eq!(render(&outcome), "no matches");
    }
}
