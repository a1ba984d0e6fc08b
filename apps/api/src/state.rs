use std::sync::Arc;

use crate::accounts::AccountStore;
use crate::config::Config;
use crate::dashboard::DashboardAggregator;
use crate::documents::DocumentStore;
use crate::ledger::Ledger;
use crate::orders::Reconciler;
use crate::submission::SubmissionService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ledger: Ledger,
    pub accounts: Arc<dyn AccountStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub reconciler: Reconciler,
    pub submissions: SubmissionService,
    pub dashboard: DashboardAggregator,
}
