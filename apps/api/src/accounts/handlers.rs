use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::accounts::service::{ensure_account, update_profile};
use crate::errors::AppError;
use crate::models::account::{AccountRow, ProfileFields};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub profile: ProfileFields,
}

/// POST /api/v1/accounts
///
/// Called by the identity system after sign-up. Safe to repeat.
pub async fn handle_provision_account(
    State(state): State<AppState>,
    Json(req): Json<AccountRequest>,
) -> Result<(StatusCode, Json<AccountRow>), AppError> {
    let account = ensure_account(state.accounts.as_ref(), req.user_id, req.profile).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// PATCH /api/v1/accounts/profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    Json(req): Json<AccountRequest>,
) -> Result<Json<AccountRow>, AppError> {
    let account = update_profile(state.accounts.as_ref(), req.user_id, req.profile).await?;
    Ok(Json(account))
}
