use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::document::{DocumentRow, DocumentStatus};

/// Changes applied together with a status transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionFields<'a> {
    pub file_reference: Option<&'a str>,
    pub failure_reason: Option<&'a str>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, document: &DocumentRow) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<DocumentRow>, AppError>;

    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DocumentRow>, AppError>;

    /// Moves the document to `next` only if its current status is one of
    /// `next.predecessors()`. Returns `None` when the guard did not match.
    async fn transition(
        &self,
        id: Uuid,
        next: DocumentStatus,
        fields: TransitionFields<'_>,
    ) -> Result<Option<DocumentRow>, AppError>;

    /// Increments `download_count` for a completed document owned by `user_id`.
    async fn record_download(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DocumentRow>, AppError>;

    /// Moves every queued or processing document created before `cutoff` to
    /// failed with `reason`, returning the rows it changed.
    async fn fail_abandoned(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<DocumentRow>, AppError>;
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, document: &DocumentRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO documents
                (id, user_id, original_filename, job_title, document_type, status,
                 download_count, file_reference, failure_reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(document.id)
        .bind(document.user_id)
        .bind(&document.original_filename)
        .bind(&document.job_title)
        .bind(document.document_type)
        .bind(document.status)
        .bind(document.download_count)
        .bind(document.file_reference.as_deref())
        .bind(document.failure_reason.as_deref())
        .bind(document.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DocumentRow>, AppError> {
        Ok(
            sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DocumentRow>, AppError> {
        Ok(sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn transition(
        &self,
        id: Uuid,
        next: DocumentStatus,
        fields: TransitionFields<'_>,
    ) -> Result<Option<DocumentRow>, AppError> {
        let allowed: Vec<&str> = next.predecessors().iter().map(|s| s.as_str()).collect();
        Ok(sqlx::query_as::<_, DocumentRow>(
            r#"
            UPDATE documents
            SET status         = $2,
                file_reference = COALESCE($3, file_reference),
                failure_reason = COALESCE($4, failure_reason)
            WHERE id = $1 AND status = ANY($5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(next)
        .bind(fields.file_reference)
        .bind(fields.failure_reason)
        .bind(allowed.as_slice())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn record_download(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DocumentRow>, AppError> {
        Ok(sqlx::query_as::<_, DocumentRow>(
            r#"
            UPDATE documents
            SET download_count = download_count + 1
            WHERE id = $1 AND user_id = $2 AND status = 'completed'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn fail_abandoned(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<DocumentRow>, AppError> {
        Ok(sqlx::query_as::<_, DocumentRow>(
            r#"
            UPDATE documents
            SET status = 'failed',
                failure_reason = COALESCE(failure_reason, $2)
            WHERE status IN ('queued', 'processing') AND created_at < $1
            RETURNING *
            "#,
        )
        .bind(cutoff)
        .bind(reason)
        .fetch_all(&self.pool)
        .await?)
    }
}
