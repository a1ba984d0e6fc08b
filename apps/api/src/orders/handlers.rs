use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};

use crate::errors::AppError;
use crate::models::order::OrderRow;
use crate::orders::plans::{catalogue, Plan};
use crate::orders::reconciler::{PaymentNotification, ReconcileOutcome};
use crate::routes::UserIdQuery;
use crate::state::AppState;

pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

/// GET /api/v1/plans
pub async fn handle_list_plans() -> Json<&'static [Plan]> {
    Json(catalogue())
}

/// GET /api/v1/orders
pub async fn handle_list_orders(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<OrderRow>>, AppError> {
    Ok(Json(state.reconciler.orders_for_user(params.user_id).await?))
}

/// POST /api/v1/payments/notifications
///
/// Redelivery-safe. Any non-2xx answer tells the notifier to try again.
pub async fn handle_payment_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(notification): Json<PaymentNotification>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    if let Some(expected) = &state.config.payment_webhook_token {
        let presented = headers
            .get(WEBHOOK_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return Err(AppError::Unauthorized);
        }
    }

    Ok(Json(state.reconciler.handle(notification).await?))
}
