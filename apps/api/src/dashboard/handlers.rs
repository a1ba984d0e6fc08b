use axum::{
    extract::{Query, State},
    Json,
};

use crate::dashboard::aggregator::DashboardSnapshot;
use crate::errors::AppError;
use crate::routes::UserIdQuery;
use crate::state::AppState;

/// GET /api/v1/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<DashboardSnapshot>, AppError> {
    Ok(Json(state.dashboard.build_snapshot(params.user_id).await?))
}
