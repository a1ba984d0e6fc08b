// Document store: records written once by the submission service and
// afterwards only status-transitioned or download-counted.

pub mod handlers;
pub mod service;
pub mod store;

pub use store::{DocumentStore, PgDocumentStore};
