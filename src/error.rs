//! Error types and process exit code handling.
//!
//! This module defines all application errors and how they are converted
//! into the exit status the `vlog-search` binary reports.

use std::path::PathBuf;

/// Application-wide error type.
///
/// This enum represents all possible errors that can occur in the application.
/// Each variant maps to a specific process exit code.
///
/// # Error Categories
///
/// - **Launcher Errors**: Missing environment file, unknown managed environment, spawn failures
/// - **Configuration Errors**: Required environment variables missing or malformed
/// - **Remote Errors**: Transport failures and non-success responses from OpenAI or Pinecone
/// - **Pipeline Errors**: Empty search results, ffmpeg failures, incomplete index builds or frame descriptions
/// - **Validation Errors**: Invalid command input
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The environment-definition file does not exist.
    ///
    /// Raised before any child process is spawned.
    #[error("Environment file not found: {}", .0.display())]
    EnvFileMissing(PathBuf),

    /// The environment-definition file exists but could not be parsed.
    #[error("Failed to read environment file {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    /// No managed environment with the requested name was found.
    ///
    /// The `searched` field lists every directory that was inspected.
    #[error("Managed environment `{name}` not found (searched: {searched})")]
    EnvironmentNotFound { name: String, searched: String },

    /// The interpreter of the managed environment could not be started.
    #[error("Failed to launch {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Typed configuration could not be deserialized from the environment.
    ///
    /// This wraps any envy::Error using the `#[from]` attribute.
    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),

    /// A setting only some commands need is absent.
    #[error("Missing configuration: {0} is not set")]
    MissingSetting(&'static str),

    /// HTTP transport failure (connection refused, timeout, bad body).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A remote API answered with a non-success status.
    #[error("{service} API returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// A configured base URL is not a valid URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested Pinecone index does not exist.
    #[error("Index `{0}` does not exist")]
    IndexNotFound(String),

    /// The index did not report `ready` within the configured timeout.
    #[error("Index `{name}` was not ready after {waited_secs} seconds")]
    IndexNotReady { name: String, waited_secs: u64 },

    /// Some context records could not be embedded or stored.
    #[error("{failed} of {total} context records failed to index")]
    IndexIncomplete { failed: usize, total: usize },

    /// Some frames could not be described.
    #[error("{failed} of {total} frames could not be described")]
    ContextIncomplete { failed: usize, total: usize },

    /// The vector search returned no usable matches.
    #[error("No matches returned for the query")]
    NoMatches,

    /// ffmpeg ran but exited with a failure status.
    #[error("ffmpeg exited with status {0}")]
    Ffmpeg(i32),

    /// Command input is invalid.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl AppError {
    /// Exit code reported by the binary when this error ends the run.
    ///
    /// # Code Mapping
    ///
    /// - `InvalidRequest` → 2 (usage error)
    /// - `Spawn` with a missing interpreter → 127 (command not found)
    /// - `Spawn` for any other reason → 126 (command not executable)
    /// - everything else → 1
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InvalidRequest(_) => 2,
            AppError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound => 127,
            AppError::Spawn { .. } => 126,
            _ => 1,
        }
    }
}
