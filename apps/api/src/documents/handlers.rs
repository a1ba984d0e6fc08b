use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::documents::service::{serve_download, DownloadGrant};
use crate::errors::AppError;
use crate::models::document::DocumentRow;
use crate::routes::UserIdQuery;
use crate::state::AppState;

/// GET /api/v1/documents
pub async fn handle_list_documents(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<DocumentRow>>, AppError> {
    Ok(Json(state.documents.list_for_user(params.user_id).await?))
}

/// POST /api/v1/documents/:id/download
pub async fn handle_download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DownloadGrant>, AppError> {
    let grant = serve_download(state.documents.as_ref(), params.user_id, id).await?;
    Ok(Json(grant))
}
