// Order Importer / Reconciler: turns payment notifications into Order rows
// and exactly-once ledger credits.

pub mod handlers;
pub mod plans;
pub mod reconciler;
pub mod store;

pub use reconciler::Reconciler;
pub use store::{OrderStore, PgOrderStore};
