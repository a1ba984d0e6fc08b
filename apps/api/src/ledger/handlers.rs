use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::account::LedgerEntryRow;
use crate::routes::UserIdQuery;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub credits: i32,
    pub can_submit: bool,
}

/// GET /api/v1/credits
pub async fn handle_get_balance(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<BalanceResponse>, AppError> {
    let credits = state.ledger.balance(params.user_id).await?;
    Ok(Json(BalanceResponse {
        user_id: params.user_id,
        credits,
        can_submit: credits > 0,
    }))
}

/// GET /api/v1/credits/history
pub async fn handle_credit_history(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<LedgerEntryRow>>, AppError> {
    Ok(Json(state.ledger.history(params.user_id).await?))
}
