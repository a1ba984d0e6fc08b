use axum::extract::{Multipart, State};
use axum::Json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::submission::request::SubmissionRequest;
use crate::submission::service::SubmissionReceipt;

/// POST /api/v1/submissions
///
/// Multipart form: `user_id`, `resume` (DOCX file), `job_title`,
/// `job_description`, optional `resume_stream`. Costs one credit.
pub async fn handle_submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmissionReceipt>, AppError> {
    let mut user_id: Option<Uuid> = None;
    let mut request = SubmissionRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                request.original_filename = field.file_name().map(str::to_string);
                request.resume = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Unreadable resume upload: {e}")))?,
                );
            }
            "user_id" => {
                let raw = read_text(field).await?;
                user_id = Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| AppError::Validation("user_id must be a UUID".to_string()))?,
                );
            }
            "job_title" => request.job_title = read_text(field).await?,
            "job_description" => request.job_description = read_text(field).await?,
            "resume_stream" => request.resume_stream = Some(read_text(field).await?),
            _ => {}
        }
    }

    let user_id =
        user_id.ok_or_else(|| AppError::Validation("user_id is required".to_string()))?;

    Ok(Json(state.submissions.submit(user_id, request).await?))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Unreadable form field: {e}")))
}
