use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Resume,
    CoverLetter,
    InterviewGuide,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    /// queued -> processing -> {completed, failed}; queued may also fail directly.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Queued, Processing) | (Queued, Failed) | (Processing, Completed) | (Processing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }

    /// States a document may be in immediately before entering `self`.
    pub fn predecessors(self) -> &'static [DocumentStatus] {
        use DocumentStatus::*;
        match self {
            Queued => &[],
            Processing => &[Queued],
            Completed => &[Processing],
            Failed => &[Queued, Processing],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Queued => "queued",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DocumentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_filename: String,
    pub job_title: String,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    pub download_count: i32,
    pub file_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DocumentRow {
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        original_filename: &str,
        job_title: &str,
        document_type: DocumentType,
        status: DocumentStatus,
    ) -> Self {
        Self {
            id,
            user_id,
            original_filename: original_filename.to_string(),
            job_title: job_title.to_string(),
            document_type,
            status,
            download_count: 0,
            file_reference: None,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(DocumentStatus::Queued.can_transition_to(DocumentStatus::Processing));
        assert!(DocumentStatus::Processing.can_transition_to(DocumentStatus::Completed));
        assert!(DocumentStatus::Processing.can_transition_to(DocumentStatus::Failed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in [
            DocumentStatus::Queued,
            DocumentStatus::Processing,
            DocumentStatus::Completed,
            DocumentStatus::Failed,
        ] {
            assert!(!DocumentStatus::Completed.can_transition_to(next));
            assert!(!DocumentStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_predecessors_agree_with_transitions() {
        let all = [
            DocumentStatus::Queued,
            DocumentStatus::Processing,
            DocumentStatus::Completed,
            DocumentStatus::Failed,
        ];
        for next in all {
            for prev in all {
                assert_eq!(
                    next.predecessors().contains(&prev),
                    prev.can_transition_to(next),
                    "{prev:?} -> {next:?}"
                );
            }
        }
    }

    #[test]
    fn test_queued_cannot_skip_to_completed() {
        assert!(!DocumentStatus::Queued.can_transition_to(DocumentStatus::Completed));
    }
}
