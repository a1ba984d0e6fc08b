//! In-process store backing every port with a single mutex.
//!
//! Used by the test suite and by `STORAGE_BACKEND=memory` for local runs.
//! One lock covers all tables, so each operation is trivially atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::dashboard::store::{DashboardRows, DashboardStore};
use crate::documents::store::{DocumentStore, TransitionFields};
use crate::errors::AppError;
use crate::ledger::LedgerStore;
use crate::models::account::{AccountRow, LedgerEntryRow, ProfileFields};
use crate::models::document::{DocumentRow, DocumentStatus};
use crate::models::order::{NewOrder, OrderRow, OrderStatus};
use crate::orders::OrderStore;

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, AccountRow>,
    /// Append order is chronological.
    ledger: Vec<LedgerEntryRow>,
    orders: Vec<OrderRow>,
    documents: Vec<DocumentRow>,
}

impl Tables {
    fn account_mut(&mut self, user_id: Uuid) -> &mut AccountRow {
        self.accounts.entry(user_id).or_insert_with(|| AccountRow {
            user_id,
            full_name: None,
            email: None,
            phone: None,
            credits: 0,
            created_at: Utc::now(),
        })
    }

    fn append_audit(
        &mut self,
        user_id: Uuid,
        delta: i32,
        resulting_balance: i32,
        cause_id: Uuid,
    ) -> LedgerEntryRow {
        let entry = LedgerEntryRow {
            id: Uuid::new_v4(),
            user_id,
            delta,
            resulting_balance,
            cause_id,
            created_at: Utc::now(),
        };
        self.ledger.push(entry.clone());
        entry
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn balance(&self, user_id: Uuid) -> Result<Option<i32>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.accounts.get(&user_id).map(|a| a.credits))
    }

    async fn debit(
        &self,
        user_id: Uuid,
        amount: i32,
        cause_id: Uuid,
    ) -> Result<Option<LedgerEntryRow>, AppError> {
        let mut tables = self.tables.lock().await;
        let Some(account) = tables.accounts.get_mut(&user_id) else {
            return Ok(None);
        };
        if account.credits < amount {
            return Ok(None);
        }
        account.credits -= amount;
        let balance = account.credits;
        Ok(Some(tables.append_audit(user_id, -amount, balance, cause_id)))
    }

    async fn credit(
        &self,
        user_id: Uuid,
        amount: i32,
        cause_id: Uuid,
    ) -> Result<LedgerEntryRow, AppError> {
        let mut tables = self.tables.lock().await;
        let account = tables.account_mut(user_id);
        account.credits = account
            .credits
            .checked_add(amount)
            .ok_or_else(|| AppError::Validation("credit balance overflow".to_string()))?;
        let balance = account.credits;
        Ok(tables.append_audit(user_id, amount, balance, cause_id))
    }

    async fn credit_order(&self, order_id: Uuid) -> Result<Option<LedgerEntryRow>, AppError> {
        let mut tables = self.tables.lock().await;
        let Some(order) = tables.orders.iter().find(|o| {
            o.id == order_id && o.status == OrderStatus::Completed && o.credited_at.is_none()
        }) else {
            return Ok(None);
        };
        let (user_id, amount) = (order.user_id, order.credits_purchased);

        let account = tables.account_mut(user_id);
        let balance = account
            .credits
            .checked_add(amount)
            .ok_or_else(|| AppError::Validation("credit balance overflow".to_string()))?;
        account.credits = balance;
        if let Some(order) = tables.orders.iter_mut().find(|o| o.id == order_id) {
            order.credited_at = Some(Utc::now());
        }
        Ok(Some(tables.append_audit(user_id, amount, balance, order_id)))
    }

    async fn entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntryRow>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ledger
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn get_account(&self, user_id: Uuid) -> Result<Option<AccountRow>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.accounts.get(&user_id).cloned())
    }

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        profile: &ProfileFields,
    ) -> Result<AccountRow, AppError> {
        let mut tables = self.tables.lock().await;
        let account = tables.account_mut(user_id);
        if let Some(name) = &profile.full_name {
            account.full_name = Some(name.clone());
        }
        if account.email.is_none() {
            account.email = profile.email.clone();
        }
        if let Some(phone) = &profile.phone {
            account.phone = Some(phone.clone());
        }
        Ok(account.clone())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_by_reference(&self, reference: &str) -> Result<Option<OrderRow>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.payment_reference == reference)
            .cloned())
    }

    async fn apply(&self, order: &NewOrder, status: OrderStatus) -> Result<OrderRow, AppError> {
        let mut tables = self.tables.lock().await;
        match tables
            .orders
            .iter_mut()
            .find(|o| o.payment_reference == order.payment_reference)
        {
            Some(existing) => {
                if existing.status == OrderStatus::Pending && existing.user_id == order.user_id {
                    existing.status = status;
                }
                Ok(existing.clone())
            }
            None => {
                let row = order.clone().into_row(status);
                tables.orders.push(row.clone());
                Ok(row)
            }
        }
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderRow>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn uncredited_completed(&self, limit: i64) -> Result<Vec<OrderRow>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.status == OrderStatus::Completed && o.credited_at.is_none())
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, document: &DocumentRow) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        if tables.documents.iter().any(|d| d.id == document.id) {
            return Err(AppError::Conflict(format!(
                "Document {} already exists",
                document.id
            )));
        }
        tables.documents.push(document.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DocumentRow>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.documents.iter().find(|d| d.id == id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DocumentRow>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .documents
            .iter()
            .rev()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn transition(
        &self,
        id: Uuid,
        next: DocumentStatus,
        fields: TransitionFields<'_>,
    ) -> Result<Option<DocumentRow>, AppError> {
        let mut tables = self.tables.lock().await;
        let Some(document) = tables.documents.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        if !document.status.can_transition_to(next) {
            return Ok(None);
        }
        document.status = next;
        if let Some(reference) = fields.file_reference {
            document.file_reference = Some(reference.to_string());
        }
        if let Some(reason) = fields.failure_reason {
            document.failure_reason = Some(reason.to_string());
        }
        Ok(Some(document.clone()))
    }

    async fn record_download(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DocumentRow>, AppError> {
        let mut tables = self.tables.lock().await;
        match tables
            .documents
            .iter_mut()
            .find(|d| d.id == id && d.user_id == user_id)
        {
            Some(document) if document.status == DocumentStatus::Completed => {
                document.download_count += 1;
                Ok(Some(document.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn fail_abandoned(
        &self,
        cutoff: DateTime<Utc>,
        reason: &str,
    ) -> Result<Vec<DocumentRow>, AppError> {
        let mut tables = self.tables.lock().await;
        let mut failed = Vec::new();
        for document in tables
            .documents
            .iter_mut()
            .filter(|d| !d.status.is_terminal() && d.created_at < cutoff)
        {
            document.status = DocumentStatus::Failed;
            document
                .failure_reason
                .get_or_insert_with(|| reason.to_string());
            failed.push(document.clone());
        }
        Ok(failed)
    }
}

#[async_trait]
impl DashboardStore for MemoryStore {
    async fn load(&self, user_id: Uuid) -> Result<DashboardRows, AppError> {
        let tables = self.tables.lock().await;
        Ok(DashboardRows {
            account: tables.accounts.get(&user_id).cloned(),
            orders: tables
                .orders
                .iter()
                .rev()
                .filter(|o| o.user_id == user_id)
                .cloned()
                .collect(),
            documents: tables
                .documents
                .iter()
                .rev()
                .filter(|d| d.user_id == user_id)
                .cloned()
                .collect(),
        })
    }
}
