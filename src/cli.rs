//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::launcher::{DEFAULT_ENV_NAME, DEFAULT_MODULE, DEFAULT_QUERY};
use crate::models::context::ContextKind;
use crate::models::matches::DEFAULT_INTERVAL;
use crate::services::context_service::DEFAULT_SUMMARY_TEMPERATURE;
use crate::services::query_service::DEFAULT_TEMPERATURE;
use crate::services::search_service::DEFAULT_TOP_K;

/// Without a subcommand, behaves like `launch` with its defaults.
#[derive(Parser, Debug)]
#[command(
    name = "vlog-search",
    version,
    about = "Search vlog footage by natural-language query"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Environment file to load (launch defaults to .env and requires it)"
    )]
    pub env_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the Python search module inside the managed environment
    Launch(LaunchArgs),
    /// Search the video index natively
    Search(SearchArgs),
    /// Describe frames or transcribe audio of a workspace's source videos
    Context(ContextArgs),
    /// Build a vector index from a workspace
    Index(IndexArgs),
    /// Generate retrieval queries from a video script
    Queries(QueriesArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct LaunchArgs {
    #[arg(long, default_value = DEFAULT_QUERY, help = "Query passed to the module")]
    pub query: String,

    #[arg(
        long = "env",
        default_value = DEFAULT_ENV_NAME,
        help = "Managed environment name or absolute prefix"
    )]
    pub env_name: String,

    #[arg(long, default_value = DEFAULT_MODULE, help = "Python module to run")]
    pub module: String,

    #[arg(long, help = "Working directory of the module")]
    pub workdir: Option<PathBuf>,

    #[arg(
        long = "envs-dir",
        help = "Extra directory to search for managed environments (repeatable)"
    )]
    pub envs_dirs: Vec<PathBuf>,

    #[arg(long, default_value_t = false, help = "Print the resolved command instead of running it")]
    pub dry_run: bool,
}

impl Default for LaunchArgs {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            env_name: DEFAULT_ENV_NAME.to_string(),
            module: DEFAULT_MODULE.to_string(),
            workdir: None,
            envs_dirs: Vec::new(),
            dry_run: false,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[arg(long)]
    pub query: String,

    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    pub top_k: u32,

    #[arg(long, value_enum, default_value_t = ContextKind::Video)]
    pub index: ContextKind,

    #[arg(long, default_value_t = false, help = "Report the clip window with most matching frames")]
    pub heavy_range: bool,

    #[arg(long, default_value_t = DEFAULT_INTERVAL, help = "Clip window width in seconds")]
    pub interval: usize,

    #[arg(long, help = "Cut the clip window out of the source video into this file")]
    pub dump_path: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "Output machine-readable JSON")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ContextArgs {
    #[arg(value_enum)]
    pub kind: ContextKind,

    #[arg(long)]
    pub workspace: PathBuf,

    #[arg(
        long,
        default_value_t = DEFAULT_SUMMARY_TEMPERATURE,
        help = "Sampling temperature of transcript summaries"
    )]
    pub temperature: f32,

    #[arg(long, default_value_t = false, help = "Output machine-readable JSON")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    #[arg(value_enum)]
    pub kind: ContextKind,

    #[arg(long)]
    pub workspace: PathBuf,

    #[arg(long, default_value_t = false, help = "Output machine-readable JSON")]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct QueriesArgs {
    #[arg(long)]
    pub script_path: PathBuf,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,
}
