//! HTTP clients for the remote services the retrieval pipeline depends on.
//!
//! Both clients share one `reqwest::Client` configuration: a per-request
//! timeout and JSON bodies. Non-success responses become `AppError::Api`
//! carrying the response body, so failures surface with the service's own message.

pub mod openai;
pub mod pinecone;

use std::time::Duration;

use url::Url;

use crate::error::AppError;

pub use openai::OpenAiClient;
pub use pinecone::{IndexHandle, PineconeClient};

/// Build the shared HTTP client.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Parse a base URL so that relative joins append to its path.
///
/// `https://api.openai.com/v1` joined with `embeddings` must give
/// `https://api.openai.com/v1/embeddings`, which requires a trailing slash.
pub(crate) fn base_url(raw: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Return the response unchanged on success, or an `Api` error with its body.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(service, status = status.as_u16(), "Remote API request failed");
    Err(AppError::Api {
        service,
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_joins_below_its_path() {
        let url = base_url("https://api.openai.com/v1").unwrap();
        assert_eq!(
            url.join("embeddings").unwrap().as_str(),
            "https://api.openai.com/v1/embeddings"
        );

        let url = base_url("http://127.0.0.1:9000/").unwrap();
        assert_eq!(
            url.join("indexes/video-context").unwrap().as_str(),
            "http://127.0.0.1:9000/indexes/video-context"
        );
    }

    #[test]
    fn base_url_rejects_garbage() {
        assert!(matches!(base_url("not a url"), Err(AppError::Url(_))));
    }
}
