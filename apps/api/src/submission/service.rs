//! Credit-gated submission.
//!
//! Flow: validate → balance pre-check → debit 1 credit → create Document (queued)
//!       → processing → pipeline call (with deadline) → completed | failed.
//!
//! The balance pre-check is a plain read. The debit is the authoritative gate,
//! so two racing submissions on a one-credit account resolve there.
//! No lock is held across the pipeline call.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::documents::service::transition;
use crate::documents::store::{DocumentStore, TransitionFields};
use crate::errors::AppError;
use crate::ledger::Ledger;
use crate::models::document::{DocumentRow, DocumentStatus, DocumentType};
use crate::pipeline::{GeneratedArtifact, ProcessingPipeline};
use crate::submission::request::{SubmissionRequest, ValidatedSubmission};

/// Credits consumed by one submission.
const SUBMISSION_COST: i32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub document: DocumentRow,
    /// Extra artifacts (cover letter, interview guide) from the same run.
    pub related_documents: Vec<DocumentRow>,
    pub credits_remaining: i32,
}

#[derive(Clone)]
pub struct SubmissionService {
    ledger: Ledger,
    documents: Arc<dyn DocumentStore>,
    pipeline: Arc<dyn ProcessingPipeline>,
    pipeline_timeout: Duration,
}

impl SubmissionService {
    pub fn new(
        ledger: Ledger,
        documents: Arc<dyn DocumentStore>,
        pipeline: Arc<dyn ProcessingPipeline>,
        pipeline_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            documents,
            pipeline,
            pipeline_timeout,
        }
    }

    pub async fn submit(
        &self,
        user_id: Uuid,
        request: SubmissionRequest,
    ) -> Result<SubmissionReceipt, AppError> {
        // Step 1: validate; no credit is touched on failure
        let submission = request.validate()?;

        // Step 2: fast-fail on an empty balance
        if !self.ledger.can_submit(user_id).await? {
            info!("Submission rejected for user {user_id}: no credits");
            return Err(AppError::InsufficientCredit);
        }

        // Step 3: authoritative debit, tagged with the document it pays for
        let document_id = Uuid::new_v4();
        let debit = self
            .ledger
            .debit(user_id, SUBMISSION_COST, document_id)
            .await?;

        // Step 4: record the document
        let document = self.create_document(user_id, document_id, &submission).await?;

        // Step 5: hand off to the pipeline
        let document = match transition(
            self.documents.as_ref(),
            document.id,
            DocumentStatus::Processing,
            TransitionFields::default(),
        )
        .await
        {
            Ok(document) => document,
            Err(e) => {
                return Err(self
                    .fail(document.id, format!("processing could not start: {e}"))
                    .await)
            }
        };
        let job = submission.to_job(Utc::now());
        info!(
            "Submitting document {} for user {user_id} ({:?}, '{}')",
            document.id, submission.resume_stream, submission.job_title
        );

        let outcome = tokio::time::timeout(self.pipeline_timeout, self.pipeline.process(&job)).await;

        let artifacts = match outcome {
            Ok(Ok(artifacts)) if !artifacts.is_empty() => artifacts,
            Ok(Ok(_)) => {
                return Err(self
                    .fail(document.id, "the pipeline returned no documents".to_string())
                    .await)
            }
            Ok(Err(e)) => return Err(self.fail(document.id, e.to_string()).await),
            Err(_) => {
                return Err(self
                    .fail(
                        document.id,
                        format!(
                            "processing timed out after {}s",
                            self.pipeline_timeout.as_secs()
                        ),
                    )
                    .await)
            }
        };

        // Step 6: success
        self.complete(document, &submission, artifacts, debit.resulting_balance)
            .await
    }

    async fn create_document(
        &self,
        user_id: Uuid,
        document_id: Uuid,
        submission: &ValidatedSubmission,
    ) -> Result<DocumentRow, AppError> {
        let document = DocumentRow::new(
            document_id,
            user_id,
            &submission.original_filename,
            &submission.job_title,
            DocumentType::Resume,
            DocumentStatus::Queued,
        );

        if let Err(e) = self.documents.insert(&document).await {
            // No document exists for this debit, so give the credit back.
            error!("Failed to record document {document_id} after debit: {e}");
            if let Err(refund) = self
                .ledger
                .credit(user_id, SUBMISSION_COST, document_id)
                .await
            {
                error!(
                    "Compensating credit for document {document_id} failed; \
                     user {user_id} needs a manual adjustment: {refund}"
                );
            }
            return Err(e);
        }
        Ok(document)
    }

    async fn complete(
        &self,
        document: DocumentRow,
        submission: &ValidatedSubmission,
        mut artifacts: Vec<GeneratedArtifact>,
        credits_remaining: i32,
    ) -> Result<SubmissionReceipt, AppError> {
        let primary_idx = artifacts
            .iter()
            .position(|a| a.document_type == DocumentType::Resume)
            .unwrap_or(0);
        let primary = artifacts.remove(primary_idx);

        let completed = match transition(
            self.documents.as_ref(),
            document.id,
            DocumentStatus::Completed,
            TransitionFields {
                file_reference: Some(&primary.file_reference),
                failure_reason: None,
            },
        )
        .await
        {
            Ok(completed) => completed,
            Err(e) => {
                return Err(self
                    .fail(document.id, format!("result could not be recorded: {e}"))
                    .await)
            }
        };

        // The primary document is settled and paid for; a lost related
        // artifact is logged rather than failing the submission.
        let mut related_documents = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let mut related = DocumentRow::new(
                Uuid::new_v4(),
                document.user_id,
                &submission.original_filename,
                &submission.job_title,
                artifact.document_type,
                DocumentStatus::Completed,
            );
            related.file_reference = Some(artifact.file_reference);
            match self.documents.insert(&related).await {
                Ok(()) => related_documents.push(related),
                Err(e) => error!(
                    "Could not record {:?} artifact {} for document {}: {e}",
                    related.document_type,
                    related.file_reference.as_deref().unwrap_or_default(),
                    completed.id
                ),
            }
        }

        info!(
            "Document {} completed for user {} with {} related artifact(s)",
            completed.id,
            completed.user_id,
            related_documents.len()
        );

        Ok(SubmissionReceipt {
            document: completed,
            related_documents,
            credits_remaining,
        })
    }

    /// Marks the document failed and builds the caller-facing error.
    /// The debited credit is not refunded here. If the status write itself
    /// fails, the abandoned-document sweep settles the row later.
    async fn fail(&self, document_id: Uuid, reason: String) -> AppError {
        warn!("Document {document_id} failed: {reason}");
        if let Err(e) = transition(
            self.documents.as_ref(),
            document_id,
            DocumentStatus::Failed,
            TransitionFields {
                file_reference: None,
                failure_reason: Some(&reason),
            },
        )
        .await
        {
            error!("Could not mark document {document_id} failed: {e}");
        }
        AppError::Processing(reason)
    }
}
