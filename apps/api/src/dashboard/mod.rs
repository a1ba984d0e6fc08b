// Dashboard Aggregator: read-only snapshot over ledger, orders and documents.

pub mod aggregator;
pub mod handlers;
pub mod store;

pub use aggregator::DashboardAggregator;
pub use store::{DashboardStore, PgDashboardStore};
