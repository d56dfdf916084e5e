//! Retrieval pipeline services.
//!
//! Services contain the pipeline logic separated from the CLI commands.
//! They talk to the remote clients, validate input, and run ffmpeg.

pub mod context_service;
pub mod ffmpeg;
pub mod index_service;
pub mod query_service;
pub mod search_service;
