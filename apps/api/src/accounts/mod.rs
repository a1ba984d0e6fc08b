// Account provisioning and display-only profile fields.
// Credits live on the same row but are owned by the ledger.

pub mod handlers;
pub mod service;
pub mod store;

pub use store::{AccountStore, PgAccountStore};
