//! Processing pipeline boundary: the external, opaque résumé optimiser.
//!
//! ARCHITECTURAL RULE: the pipeline is called at most once per submission.
//! No retries happen on this side; retry policy belongs to the pipeline.
//!
//! `AppState` carries an `Arc<dyn ProcessingPipeline>` so tests can swap in stubs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::document::DocumentType;
use crate::submission::request::ResumeStream;

pub mod webhook;

pub use webhook::WebhookPipeline;

/// Self-contained job description sent to the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineJob {
    /// Base64 data URL of the DOCX upload.
    pub resume: String,
    pub job_title: String,
    pub job_description: String,
    pub resume_stream: ResumeStream,
    /// Idempotency / tracing stamp.
    pub timestamp: DateTime<Utc>,
}

/// One generated file reported by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedArtifact {
    pub document_type: DocumentType,
    #[serde(alias = "file_url", alias = "fileUrl")]
    pub file_reference: String,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline unreachable: {0}")]
    Http(#[from] reqwest::Error),

    /// The pipeline answered with a failure payload.
    #[error("{reason}")]
    Rejected { status: u16, reason: String },

    #[error("unexpected pipeline response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait ProcessingPipeline: Send + Sync {
    async fn process(&self, job: &PipelineJob) -> Result<Vec<GeneratedArtifact>, PipelineError>;
}
