use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user account as seen by this service. The id is owned by the identity
/// system; `credits` is only ever written through the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct AccountRow {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub credits: i32,
    pub created_at: DateTime<Utc>,
}

/// One append-only ledger audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct LedgerEntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub delta: i32,
    pub resulting_balance: i32,
    /// Order id for credits, document id for debits.
    pub cause_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Profile fields supplied by the identity boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileFields {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}
