// Account Ledger: sole owner of the `credits` column.
// Every mutation goes through `Ledger`, which delegates the atomic work to a `LedgerStore`.

pub mod handlers;
pub mod service;
pub mod store;

pub use service::Ledger;
pub use store::{LedgerStore, PgLedgerStore};
