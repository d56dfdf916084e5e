//! vlog-search - search vlog footage by natural-language query.
//!
//! The crate has two halves:
//!
//! - **Launcher**: loads an environment file, activates a managed Python
//!   environment and runs `functions.search_context --query "<text>"`,
//!   reporting the module's exit status as its own.
//! - **Retrieval pipeline**: the same lookup in-process. Frame descriptions and
//!   transcript summaries are generated from the source footage with ffmpeg,
//!   `gpt-4o` and `whisper-1`, embedded with OpenAI `text-embedding-3-small`
//!   into Pinecone indexes, and queries are answered by nearest-neighbour search.
//!
//! # Architecture
//!
//! - **CLI**: clap (`cli`), one handler per subcommand (`commands`)
//! - **Configuration**: dotenvy + envy (`config`)
//! - **Remote APIs**: reqwest (`clients`)
//! - **Pipeline logic**: `services`, over the data types in `models`

pub mod cli;
pub mod clients;
pub mod commands;
pub mod config;
pub mod error;
pub mod launcher;
pub mod models;
pub mod services;
