use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::documents::store::{DocumentStore, TransitionFields};
use crate::errors::AppError;
use crate::models::document::{DocumentRow, DocumentStatus};

/// Applies a guarded status transition, failing with `Conflict` if the
/// document is missing or already past the allowed source states.
pub async fn transition(
    store: &dyn DocumentStore,
    id: Uuid,
    next: DocumentStatus,
    fields: TransitionFields<'_>,
) -> Result<DocumentRow, AppError> {
    match store.transition(id, next, fields).await? {
        Some(document) => {
            info!("Document {id} -> {}", next.as_str());
            Ok(document)
        }
        None => {
            let current = store.get(id).await?;
            Err(AppError::Conflict(match current {
                Some(doc) => format!(
                    "Document {id} cannot move from {} to {}",
                    doc.status.as_str(),
                    next.as_str()
                ),
                None => format!("Document {id} does not exist"),
            }))
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadGrant {
    pub document_id: Uuid,
    pub original_filename: String,
    pub file_reference: String,
    pub download_count: i32,
}

/// Serves one download: the caller receives the artifact locator and the
/// count is bumped in the same write.
pub async fn serve_download(
    store: &dyn DocumentStore,
    user_id: Uuid,
    id: Uuid,
) -> Result<DownloadGrant, AppError> {
    let not_found = || AppError::NotFound(format!("Document {id} not found"));

    let document = match store.record_download(id, user_id).await? {
        Some(document) => document,
        None => {
            let existing = store
                .get(id)
                .await?
                .filter(|d| d.user_id == user_id)
                .ok_or_else(not_found)?;
            return Err(AppError::Conflict(format!(
                "Document {id} is {} and cannot be downloaded",
                existing.status.as_str()
            )));
        }
    };

    let file_reference = document.file_reference.clone().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "completed document {id} has no file reference"
        ))
    })?;

    Ok(DownloadGrant {
        document_id: document.id,
        original_filename: document.original_filename,
        file_reference,
        download_count: document.download_count,
    })
}

/// Fails documents left queued or processing for longer than `max_age`.
/// A submission whose own status write failed ends up here.
pub async fn fail_abandoned(
    store: &dyn DocumentStore,
    max_age: Duration,
) -> Result<usize, AppError> {
    let max_age = chrono::Duration::from_std(max_age)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid document max age: {e}")))?;
    let failed = store
        .fail_abandoned(Utc::now() - max_age, "processing was interrupted")
        .await?;
    for document in &failed {
        warn!(
            "Document {} for user {} abandoned; marked failed",
            document.id, document.user_id
        );
    }
    Ok(failed.len())
}

/// Runs `fail_abandoned` forever on a fixed interval.
pub async fn run_abandoned_sweeper(store: Arc<dyn DocumentStore>, every: Duration, max_age: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        if let Err(e) = fail_abandoned(store.as_ref(), max_age).await {
            error!("Abandoned document sweep failed: {e}");
        }
    }
}
