use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Failed)
    }
}

/// Purchasable plan identifiers. Display names are accepted on input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    #[serde(alias = "Starter Pack")]
    StarterPack,
    #[serde(alias = "Career Boost")]
    CareerBoost,
    #[serde(alias = "Professional Suite")]
    ProfessionalSuite,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_reference: String,
    pub package_type: PackageType,
    pub credits_purchased: i32,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub status: OrderStatus,
    /// Set in the same transaction that applies the ledger credit.
    pub credited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Order fields carried by a payment notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub payment_reference: String,
    pub user_id: Uuid,
    pub package_type: PackageType,
    pub credits_purchased: i32,
    pub amount: i64,
    pub currency: String,
}

impl NewOrder {
    pub fn into_row(self, status: OrderStatus) -> OrderRow {
        OrderRow {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            payment_reference: self.payment_reference,
            package_type: self.package_type,
            credits_purchased: self.credits_purchased,
            amount: self.amount,
            currency: self.currency,
            status,
            credited_at: None,
            created_at: Utc::now(),
        }
    }
}
