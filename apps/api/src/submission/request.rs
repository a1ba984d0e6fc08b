use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use zip::ZipArchive;

use crate::errors::AppError;
use crate::pipeline::PipelineJob;

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Part name every WordprocessingML package carries.
const DOCX_MAIN_PART: &str = "word/document.xml";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResumeStream {
    Finance,
    Tech,
    Other,
}

impl ResumeStream {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Finance" | "finance" => Some(Self::Finance),
            "Tech" | "tech" | "Technology" => Some(Self::Tech),
            "Other" | "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// One submission attempt as received. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
    pub resume: Option<Bytes>,
    pub original_filename: Option<String>,
    pub job_title: String,
    pub job_description: String,
    /// Missing means `Other`.
    pub resume_stream: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
    pub resume: Bytes,
    pub original_filename: String,
    pub job_title: String,
    pub job_description: String,
    pub resume_stream: ResumeStream,
}

impl SubmissionRequest {
    /// Collects every offending field rather than stopping at the first.
    pub fn validate(self) -> Result<ValidatedSubmission, AppError> {
        let mut fields = Vec::new();

        let filename = self
            .original_filename
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("resume.docx")
            .to_string();
        let resume = match self.resume {
            Some(bytes) if is_docx(&filename, &bytes) => Some(bytes),
            _ => {
                fields.push("resume");
                None
            }
        };

        let job_title = self.job_title.trim().to_string();
        if job_title.is_empty() {
            fields.push("job_title");
        }
        let job_description = self.job_description.trim().to_string();
        if job_description.is_empty() {
            fields.push("job_description");
        }

        let resume_stream = match self.resume_stream.as_deref().map(str::trim) {
            None | Some("") => Some(ResumeStream::Other),
            Some(raw) => ResumeStream::parse(raw),
        };
        if resume_stream.is_none() {
            fields.push("resume_stream");
        }

        match (resume, resume_stream) {
            (Some(resume), Some(resume_stream)) if fields.is_empty() => Ok(ValidatedSubmission {
                resume,
                original_filename: filename,
                job_title,
                job_description,
                resume_stream,
            }),
            _ => Err(AppError::InvalidSubmission { fields }),
        }
    }
}

impl ValidatedSubmission {
    pub fn to_job(&self, timestamp: DateTime<Utc>) -> PipelineJob {
        PipelineJob {
            resume: format!("data:{DOCX_MIME};base64,{}", STANDARD.encode(&self.resume)),
            job_title: self.job_title.clone(),
            job_description: self.job_description.clone(),
            resume_stream: self.resume_stream,
            timestamp,
        }
    }
}

/// The upload must open as a ZIP archive that contains the main document
/// part. Reading the document content is the pipeline's job.
fn is_docx(filename: &str, bytes: &[u8]) -> bool {
    if !filename.to_ascii_lowercase().ends_with(".docx") {
        return false;
    }
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => {
            debug!("Rejecting {filename}: not a readable archive: {e}");
            return false;
        }
    };
    let has_main_part = archive.by_name(DOCX_MAIN_PART).is_ok();
    if !has_main_part {
        debug!("Rejecting {filename}: archive has no {DOCX_MAIN_PART}");
    }
    has_main_part
}
