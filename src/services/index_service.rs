//! Index service - builds the dense vector index from a workspace.
//!
//! # Concurrency
//!
//! Records are processed as independent tasks, but at most
//! [`MAX_CONCURRENT_EMBEDDINGS`] embedding requests are in flight at once to
//! stay under the embedding API's rate limit. Upserts run outside that limit.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::clients::openai::OpenAiClient;
use crate::clients::pinecone::{CreateIndexRequest, IndexHandle, PineconeClient, Vector};
use crate::error::AppError;
use crate::models::context::{self, ContextKind, ContextRecord};

pub const MAX_CONCURRENT_EMBEDDINGS: usize = 4;

/// Delay between readiness checks.
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of an index build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub index: String,
    pub created: bool,
    pub indexed: usize,
    /// Records with no text to embed.
    pub skipped: usize,
    pub failed: usize,
}

enum RecordOutcome {
    Indexed,
    Skipped,
}

/// Build (or extend) the index for `kind` from `workspace`.
///
/// # Process
///
/// 1. Collect record files below `<workspace>/<kind folder>`
/// 2. Create the index if it does not exist yet
/// 3. Embed and upsert every record, keyed by file path
/// 4. Fail if any record failed, otherwise wait until the index reports ready
///
/// # Error Handling
///
/// - Individual record failures are logged and counted, the rest still run
/// - Records with empty text are skipped with a warning
///
/// # Errors
///
/// - `InvalidRequest`: Workspace or context folder missing
/// - `IndexIncomplete`: At least one record failed
/// - `IndexNotReady`: The index did not become ready within `ready_timeout`
pub async fn build_index(
    openai: &OpenAiClient,
    pinecone: &PineconeClient,
    kind: ContextKind,
    workspace: &Path,
    ready_timeout: Duration,
) -> Result<IndexReport, AppError> {
    let files = context::collect_records(kind, workspace)?;
    let name = kind.index_name();
    tracing::info!(index = name, records = files.len(), "Building index");

    let (index, created) = match pinecone.describe_index(name).await? {
        Some(description) => (pinecone.handle(&description)?, false),
        None => {
            let description = pinecone
                .create_index(&CreateIndexRequest::serverless(name))
                .await?;
            (pinecone.handle(&description)?, true)
        }
    };

    let mut report = IndexReport {
        index: name.to_string(),
        created,
        ..IndexReport::default()
    };

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_EMBEDDINGS));
    let mut tasks = JoinSet::new();
    for path in files {
        let openai = openai.clone();
        let index = index.clone();
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let outcome = store_record(&openai, &index, &semaphore, kind, &path).await;
            (path, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(RecordOutcome::Indexed))) => report.indexed += 1,
            Ok((path, Ok(RecordOutcome::Skipped))) => {
                tracing::warn!(path = %path.display(), "Skipping record with no text");
                report.skipped += 1;
            }
            Ok((path, Err(e))) => {
                tracing::error!(path = %path.display(), "Failed to index record: {}", e);
                report.failed += 1;
            }
            Err(e) => {
                tracing::error!("Index task aborted: {}", e);
                report.failed += 1;
            }
        }
    }

    if report.failed > 0 {
        return Err(AppError::IndexIncomplete {
            failed: report.failed,
            total: report.indexed + report.skipped + report.failed,
        });
    }

    wait_until_ready(pinecone, name, ready_timeout).await?;
    tracing::info!(index = name, indexed = report.indexed, skipped = report.skipped, "Index ready");
    Ok(report)
}

/// Embed one record and store it.
///
/// An upsert Pinecone acknowledges with a count of zero is a failure.
async fn store_record(
    openai: &OpenAiClient,
    index: &IndexHandle,
    semaphore: &Semaphore,
    kind: ContextKind,
    path: &Path,
) -> Result<RecordOutcome, AppError> {
    tracing::info!(path = %path.display(), "Storing record in the index");
    let record = ContextRecord::load(kind, path)?;
    if record.text.trim().is_empty() {
        return Ok(RecordOutcome::Skipped);
    }

    let values = {
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| AppError::InvalidRequest(format!("embedding limiter closed: {}", e)))?;
        openai.embed(&record.text).await?
    };

    let upserted = index
        .upsert(&[Vector {
            id: record.id.clone(),
            values,
            metadata: record.metadata(),
        }])
        .await?;
    if upserted == 0 {
        return Err(AppError::Api {
            service: "Pinecone",
            status: 200,
            body: format!("upsert of {} stored no vectors", record.id),
        });
    }
    Ok(RecordOutcome::Indexed)
}

/// Poll `describe_index` once a second until the index reports ready.
pub async fn wait_until_ready(
    pinecone: &PineconeClient,
    name: &str,
    timeout: Duration,
) -> Result<(), AppError> {
    let started = Instant::now();
    loop {
        let ready = pinecone
            .describe_index(name)
            .await?
            .map(|d| d.status.ready)
            .unwrap_or(false);
        if ready {
            return Ok(());
        }

        if started.elapsed() >= timeout {
            return Err(AppError::IndexNotReady {
                name: name.to_string(),
                waited_secs: timeout.as_secs(),
            });
        }
        tracing::debug!(index = name, "Waiting for index to become ready");
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}
