pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::accounts::handlers as accounts;
use crate::dashboard::handlers as dashboard;
use crate::documents::handlers as documents;
use crate::ledger::handlers as ledger;
use crate::orders::handlers as orders;
use crate::state::AppState;
use crate::submission::handlers as submission;

/// The trusted user id handed over by the identity boundary.
#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Catalogue and payments
        .route("/api/v1/plans", get(orders::handle_list_plans))
        .route("/api/v1/orders", get(orders::handle_list_orders))
        .route(
            "/api/v1/payments/notifications",
            post(orders::handle_payment_notification),
        )
        // Accounts and ledger
        .route("/api/v1/accounts", post(accounts::handle_provision_account))
        .route(
            "/api/v1/accounts/profile",
            patch(accounts::handle_update_profile),
        )
        .route("/api/v1/credits", get(ledger::handle_get_balance))
        .route(
            "/api/v1/credits/history",
            get(ledger::handle_credit_history),
        )
        // Submissions and documents
        .route(
            "/api/v1/submissions",
            post(submission::handle_submit).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/documents", get(documents::handle_list_documents))
        .route(
            "/api/v1/documents/:id/download",
            post(documents::handle_download),
        )
        // Dashboard
        .route("/api/v1/dashboard", get(dashboard::handle_dashboard))
        .with_state(state)
}
