//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

/// Configuration for the commands that talk to OpenAI and Pinecone.
///
/// The `launch` command does not read this struct; it forwards the
/// environment file to the child process instead.
///
/// # Environment Variables
///
/// - `OPENAI_API_KEY` (required): key for the embeddings and chat APIs
/// - `PINECONE_API_KEY` (required by `search` and `index`): key for the vector index APIs
/// - `OPENAI_BASE_URL` (optional): defaults to `https://api.openai.com/v1`
/// - `PINECONE_CONTROLLER_URL` (optional): defaults to `https://api.pinecone.io`
/// - `HTTP_TIMEOUT_SECS` (optional): per-request timeout, defaults to 30
/// - `INDEX_READY_TIMEOUT_SECS` (optional): how long to wait for a built index, defaults to 300
/// - `FFMPEG_BIN` (optional): ffmpeg executable for clip, frame and audio extraction, defaults to `ffmpeg`
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub openai_api_key: String,

    /// Only the index commands need it; checked when the Pinecone client is built.
    #[serde(default)]
    pub pinecone_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_pinecone_controller_url")]
    pub pinecone_controller_url: String,

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_index_ready_timeout_secs")]
    pub index_ready_timeout_secs: u64,

    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_pinecone_controller_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_index_ready_timeout_secs() -> u64 {
    300
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// When `env_file` is given, that file must exist and is loaded first.
    /// Otherwise a `.env` file in the working directory is loaded if present
    /// (does nothing if not found). Variables already set in the process
    /// environment take precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - An explicitly requested environment file is missing or malformed
    /// - Required environment variables are missing (e.g., OPENAI_API_KEY)
    /// - Environment variable values cannot be parsed into expected types
    pub fn load(env_file: Option<&Path>) -> Result<Self, AppError> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|source| {
                    if source.not_found() {
                        AppError::EnvFileMissing(path.to_path_buf())
                    } else {
                        AppError::EnvFile {
                            path: path.to_path_buf(),
                            source,
                        }
                    }
                })?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }

        // Field names are automatically converted: openai_api_key -> OPENAI_API_KEY
        Ok(envy::from_env::<Config>()?)
    }

    /// Build configuration from explicit key/value pairs instead of the process environment.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter::<_, Config>(pairs)?)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn index_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.index_ready_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn defaults_apply_when_only_keys_are_set() {
        let config = Config::from_pairs([
            pair("OPENAI_API_KEY", "sk-test"),
            pair("PINECONE_API_KEY", "pc-test"),
        ])
        .unwrap();

        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert_eq!(config.pinecone_controller_url, "https://api.pinecone.io");
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.index_ready_timeout(), Duration::from_secs(300));
        assert_eq!(config.ffmpeg_bin, "ffmpeg");
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = Config::from_pairs([pair("PINECONE_API_KEY", "pc-test")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let config = Config::from_pairs([pair("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(config.pinecone_api_key, None);
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        let err = Config::from_pairs([
            pair("OPENAI_API_KEY", "sk-test"),
            pair("PINECONE_API_KEY", "pc-test"),
            pair("HTTP_TIMEOUT_SECS", "soon"),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.env"))).unwrap_err();
        assert!(matches!(err, AppError::EnvFileMissing(_)));
    }
}
