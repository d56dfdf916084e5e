//! OpenAI embeddings, chat completions and audio transcriptions.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Config;
use crate::error::AppError;

/// Model used for both indexing and querying; vectors from different models are not comparable.
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Output dimension of [`EMBEDDING_MODEL`].
pub const EMBEDDING_DIMENSION: u32 = 1536;

pub const CHAT_MODEL: &str = "gpt-4o";

pub const TRANSCRIPTION_MODEL: &str = "whisper-1";

const SERVICE: &str = "OpenAI";

/// Transcribing a whole video's audio takes far longer than the other calls.
const TRANSCRIPTION_TIMEOUT: Duration = Duration::from_secs(600);

/// One message of a chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Plain text, or a list of typed parts for multimodal input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// # Example
///
/// ```json
/// { "type": "image_url", "image_url": { "url": "data:image/jpeg;base64,..." } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    /// User message carrying one JPEG image inline as a base64 data URL.
    pub fn user_jpeg(image: &[u8]) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/jpeg;base64,{}", STANDARD.encode(image)),
                },
            }]),
        }
    }
}

/// `verbose_json` transcription restricted to what the pipeline reads.
#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
}

/// A timed span of the transcript, in seconds.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Client for the OpenAI REST API.
///
/// Cloning is cheap: the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl OpenAiClient {
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://api.openai.com/v1`
    /// * `api_key` - bearer token
    /// * `timeout` - per-request timeout
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: super::http_client(timeout)?,
            base_url: super::base_url(base_url)?,
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            &config.openai_base_url,
            config.openai_api_key.clone(),
            config.http_timeout(),
        )
    }

    /// Embed `input` with [`EMBEDDING_MODEL`].
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for empty input (the API rejects it)
    /// - `Api` / `Http` for remote failures
    /// - `Api` with status 200 if the response carries no embedding
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        if input.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "cannot embed empty text".to_string(),
            ));
        }

        let response = self
            .http
            .post(self.base_url.join("embeddings")?)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: EMBEDDING_MODEL,
                input,
            })
            .send()
            .await?;
        let body: EmbeddingResponse = super::check_status(SERVICE, response).await?.json().await?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| AppError::Api {
                service: SERVICE,
                status: 200,
                body: "response contained no embedding".to_string(),
            })
    }

    /// Run a chat completion with [`CHAT_MODEL`] and return the first choice's text.
    pub async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, AppError> {
        let response = self
            .http
            .post(self.base_url.join("chat/completions")?)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: CHAT_MODEL,
                temperature,
                messages,
            })
            .send()
            .await?;
        let body: ChatResponse = super::check_status(SERVICE, response).await?.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Api {
                service: SERVICE,
                status: 200,
                body: "response contained no message content".to_string(),
            })
    }

    /// Transcribe the audio file at `path` with [`TRANSCRIPTION_MODEL`],
    /// with segment-level timestamps.
    pub async fn transcribe(&self, path: &Path) -> Result<Transcription, AppError> {
        let audio = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", Part::bytes(audio).file_name(file_name));

        tracing::debug!(path = %path.display(), "Uploading audio for transcription");
        let response = self
            .http
            .post(self.base_url.join("audio/transcriptions")?)
            .bearer_auth(&self.api_key)
            .timeout(TRANSCRIPTION_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        Ok(super::check_status(SERVICE, response).await?.json().await?)
    }
}
