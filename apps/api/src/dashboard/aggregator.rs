use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::dashboard::store::{DashboardRows, DashboardStore};
use crate::errors::AppError;
use crate::models::document::DocumentRow;
use crate::models::order::{OrderRow, OrderStatus};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardUser {
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub credits: i32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DashboardStats {
    pub total_orders: usize,
    pub total_documents: usize,
    /// Sum of completed orders' amounts, minor units.
    pub total_spent: i64,
    pub last_order_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub user: DashboardUser,
    /// False means the client should render the "no credits" state.
    pub can_submit: bool,
    pub orders: Vec<OrderRow>,
    pub documents: Vec<DocumentRow>,
    pub stats: DashboardStats,
}

#[derive(Clone)]
pub struct DashboardAggregator {
    store: Arc<dyn DashboardStore>,
}

impl DashboardAggregator {
    pub fn new(store: Arc<dyn DashboardStore>) -> Self {
        Self { store }
    }

    /// Pure read. Unknown users get an empty, zeroed snapshot.
    pub async fn build_snapshot(&self, user_id: Uuid) -> Result<DashboardSnapshot, AppError> {
        let DashboardRows {
            account,
            mut orders,
            mut documents,
        } = self.store.load(user_id).await?;

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let stats = derive_stats(&orders, &documents);
        let credits = account.as_ref().map_or(0, |a| a.credits);
        let user = DashboardUser {
            user_id,
            full_name: account.as_ref().and_then(|a| a.full_name.clone()),
            email: account.as_ref().and_then(|a| a.email.clone()),
            phone: account.as_ref().and_then(|a| a.phone.clone()),
            credits,
        };

        Ok(DashboardSnapshot {
            user,
            can_submit: credits > 0,
            orders,
            documents,
            stats,
        })
    }
}

/// Derived counters; computed from the same lists the snapshot returns.
pub fn derive_stats(orders: &[OrderRow], documents: &[DocumentRow]) -> DashboardStats {
    DashboardStats {
        total_orders: orders.len(),
        total_documents: documents.len(),
        total_spent: orders
            .iter()
            .filter(|o| o.status == OrderStatus::Completed)
            .map(|o| o.amount)
            .sum(),
        last_order_date: orders.iter().map(|o| o.created_at).max(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::accounts::AccountStore;
    use crate::documents::DocumentStore;
    use crate::ledger::Ledger;
    use crate::memory::MemoryStore;
    use crate::models::account::ProfileFields;
    use crate::models::document::{DocumentStatus, DocumentType};
    use crate::models::order::{NewOrder, PackageType};
    use crate::orders::Reconciler;

    fn aggregator(store: Arc<MemoryStore>) -> DashboardAggregator {
        DashboardAggregator::new(store)
    }

    fn order(amount: i64, status: OrderStatus, age_days: i64) -> OrderRow {
        let mut row = NewOrder {
            payment_reference: format!("PR-{}", Uuid::new_v4()),
            user_id: Uuid::nil(),
            package_type: PackageType::StarterPack,
            credits_purchased: 1,
            amount,
            currency: "NGN".to_string(),
        }
        .into_row(status);
        row.created_at = Utc::now() - Duration::days(age_days);
        row
    }

    #[test]
    fn test_stats_empty_are_zeroed() {
        assert_eq!(derive_stats(&[], &[]), DashboardStats::default());
    }

    #[test]
    fn test_total_spent_counts_only_completed() {
        let orders = vec![
            order(400_000, OrderStatus::Completed, 1),
            order(1_250_000, OrderStatus::Failed, 2),
            order(2_500_000, OrderStatus::Pending, 0),
            order(1_250_000, OrderStatus::Completed, 5),
        ];
        let stats = derive_stats(&orders, &[]);
        assert_eq!(stats.total_orders, 4);
        assert_eq!(stats.total_spent, 1_650_000);
        assert_eq!(stats.last_order_date, Some(orders[2].created_at));
    }

    #[tokio::test]
    async fn test_unknown_user_snapshot_is_empty_not_error() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = aggregator(store)
            .build_snapshot(Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(snapshot.user.credits, 0);
        assert!(!snapshot.can_submit);
        assert!(snapshot.orders.is_empty());
        assert!(snapshot.documents.is_empty());
        assert_eq!(snapshot.stats, DashboardStats::default());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_purchase_and_documents() {
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::new(store.clone());
        let reconciler = Reconciler::new(store.clone(), ledger.clone());
        let user = Uuid::new_v4();

        AccountStore::upsert_profile(
            store.as_ref(),
            user,
            &ProfileFields {
                full_name: Some("Fatima Abdul".to_string()),
                email: Some("fatima@example.com".to_string()),
                phone: None,
            },
        )
        .await
        .unwrap();
        reconciler
            .record_completion(NewOrder {
                payment_reference: "PR-123".to_string(),
                user_id: user,
                package_type: PackageType::CareerBoost,
                credits_purchased: 5,
                amount: 1_250_000,
                currency: "NGN".to_string(),
            })
            .await
            .unwrap();
        let doc = DocumentRow::new(
            Uuid::new_v4(),
            user,
            "cv.docx",
            "Analyst",
            DocumentType::Resume,
            DocumentStatus::Queued,
        );
        DocumentStore::insert(store.as_ref(), &doc).await.unwrap();

        let snapshot = aggregator(store).build_snapshot(user).await.unwrap();

        assert_eq!(snapshot.user.credits, 5);
        assert_eq!(snapshot.user.full_name.as_deref(), Some("Fatima Abdul"));
        assert!(snapshot.can_submit);
        assert_eq!(snapshot.stats.total_orders, 1);
        assert_eq!(snapshot.stats.total_documents, 1);
        assert_eq!(snapshot.stats.total_spent, 1_250_000);
        assert_eq!(
            snapshot.stats.last_order_date,
            Some(snapshot.orders[0].created_at)
        );
    }

    #[tokio::test]
    async fn test_snapshot_balance_matches_its_credited_orders_under_writes() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(store.clone(), Ledger::new(store.clone()));
        let aggregator = aggregator(store);
        let user = Uuid::new_v4();

        let writer = tokio::spawn(async move {
            for i in 0..50 {
                reconciler
                    .record_completion(NewOrder {
                        payment_reference: format!("PR-{i}"),
                        user_id: user,
                        package_type: PackageType::StarterPack,
                        credits_purchased: 1,
                        amount: 400_000,
                        currency: "NGN".to_string(),
                    })
                    .await
                    .unwrap();
                tokio::task::yield_now().await;
            }
        });

        for _ in 0..50 {
            let snapshot = aggregator.build_snapshot(user).await.unwrap();
            let credited: i32 = snapshot
                .orders
                .iter()
                .filter(|o| o.credited_at.is_some())
                .map(|o| o.credits_purchased)
                .sum();
            assert_eq!(snapshot.user.credits, credited);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();

        let done = aggregator.build_snapshot(user).await.unwrap();
        assert_eq!(done.user.credits, 50);
        assert_eq!(done.stats.total_orders, 50);
    }
}
