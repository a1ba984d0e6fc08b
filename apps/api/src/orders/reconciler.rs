//! Reconciliation: converts payment notifications into durable Order and
//! ledger state exactly once.
//!
//! An order's credit is applied by `Ledger::credit_order`, which sets the
//! order's `credited_at` in the same transaction as the balance change and the
//! audit row. Either all three land or none do, so any completed order with
//! `credited_at` unset is still owed and the next delivery or sweep applies it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::ledger::Ledger;
use crate::models::order::{NewOrder, OrderRow, OrderStatus, PackageType};
use crate::orders::plans::plan_for;
use crate::orders::store::OrderStore;

/// Upper bound on orders credited per sweep pass.
const SWEEP_BATCH: i64 = 100;

/// Inbound payment boundary payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentNotification {
    #[serde(alias = "payment_reference")]
    pub payment_reference: String,
    #[serde(alias = "user_id")]
    pub user_id: Uuid,
    #[serde(alias = "package_type")]
    pub package_type: PackageType,
    #[serde(alias = "credits_purchased")]
    pub credits_purchased: i32,
    pub amount: i64,
    pub currency: String,
    pub status: OrderStatus,
}

impl PaymentNotification {
    fn into_new_order(self) -> Result<(NewOrder, OrderStatus), AppError> {
        let payment_reference = self.payment_reference.trim().to_string();
        if payment_reference.is_empty() {
            return Err(AppError::Validation(
                "paymentReference cannot be empty".to_string(),
            ));
        }
        if self.credits_purchased <= 0 {
            return Err(AppError::Validation(
                "creditsPurchased must be a positive integer".to_string(),
            ));
        }
        if self.amount < 0 {
            return Err(AppError::Validation("amount cannot be negative".to_string()));
        }
        let currency = self.currency.trim().to_ascii_uppercase();
        if currency.is_empty() {
            return Err(AppError::Validation("currency cannot be empty".to_string()));
        }

        Ok((
            NewOrder {
                payment_reference,
                user_id: self.user_id,
                package_type: self.package_type,
                credits_purchased: self.credits_purchased,
                amount: self.amount,
                currency,
            },
            self.status,
        ))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub order: OrderRow,
    /// True only for the delivery that actually applied the ledger credit.
    pub credited: bool,
}

#[derive(Clone)]
pub struct Reconciler {
    orders: Arc<dyn OrderStore>,
    ledger: Ledger,
}

impl Reconciler {
    pub fn new(orders: Arc<dyn OrderStore>, ledger: Ledger) -> Self {
        Self { orders, ledger }
    }

    /// Routes a notification by its reported status.
    pub async fn handle(&self, notification: PaymentNotification) -> Result<ReconcileOutcome, AppError> {
        let (order, status) = notification.into_new_order()?;
        match status {
            OrderStatus::Completed => self.record_completion(order).await,
            OrderStatus::Pending => Ok(ReconcileOutcome {
                order: self.record_pending(order).await?,
                credited: false,
            }),
            OrderStatus::Failed => Ok(ReconcileOutcome {
                order: self.record_failure(order).await?,
                credited: false,
            }),
        }
    }

    /// Idempotent under redelivery: the ledger is credited once per order.
    pub async fn record_completion(&self, order: NewOrder) -> Result<ReconcileOutcome, AppError> {
        let reference = order.payment_reference.clone();
        self.try_record_completion(order).await.map_err(|e| {
            error!("Payment {reference} could not be reconciled: {e}");
            match e {
                AppError::Validation(_) | AppError::Reconciliation(_) => e,
                other => AppError::Reconciliation(format!(
                    "payment {reference} could not be applied: {other}"
                )),
            }
        })
    }

    async fn try_record_completion(&self, order: NewOrder) -> Result<ReconcileOutcome, AppError> {
        let plan = plan_for(order.package_type);
        if plan.credits != order.credits_purchased {
            warn!(
                "Payment {} reports {} credits for {}, catalogue says {}; using reported value",
                order.payment_reference, order.credits_purchased, plan.name, plan.credits
            );
        }

        let stored = self.orders.apply(&order, OrderStatus::Completed).await?;

        if stored.user_id != order.user_id {
            return Err(AppError::Reconciliation(format!(
                "payment {} belongs to a different user",
                order.payment_reference
            )));
        }
        if stored.status != OrderStatus::Completed {
            return Err(AppError::Reconciliation(format!(
                "payment {} is recorded as {:?} and cannot complete",
                order.payment_reference, stored.status
            )));
        }

        let credited = self.apply_credit(&stored).await?;
        if credited {
            info!(
                "Order {} ({}) completed: {} credits for user {}",
                stored.id, stored.payment_reference, stored.credits_purchased, stored.user_id
            );
        } else {
            info!(
                "Payment {} already reconciled; ignoring redelivery",
                stored.payment_reference
            );
        }

        Ok(ReconcileOutcome {
            order: stored,
            credited,
        })
    }

    /// Purchase initiation observed. Never credits.
    pub async fn record_pending(&self, order: NewOrder) -> Result<OrderRow, AppError> {
        self.record_unsettled(order, OrderStatus::Pending).await
    }

    /// A completed order is never moved to failed; the stored row is returned as-is.
    pub async fn record_failure(&self, order: NewOrder) -> Result<OrderRow, AppError> {
        self.record_unsettled(order, OrderStatus::Failed).await
    }

    async fn record_unsettled(
        &self,
        order: NewOrder,
        status: OrderStatus,
    ) -> Result<OrderRow, AppError> {
        let stored = self.orders.apply(&order, status).await?;
        if stored.user_id != order.user_id {
            error!(
                "Payment {} reported for user {} is owned by another user",
                order.payment_reference, order.user_id
            );
            return Err(AppError::Reconciliation(format!(
                "payment {} belongs to a different user",
                order.payment_reference
            )));
        }

        if stored.status != status && stored.status.is_terminal() {
            warn!(
                "Ignoring {:?} notice for {:?} payment {}",
                status, stored.status, stored.payment_reference
            );
        } else {
            info!(
                "Order {} ({}) is {:?}",
                stored.id, stored.payment_reference, stored.status
            );
        }
        Ok(stored)
    }

    /// Credits completed orders that never had their credit applied
    /// (e.g. a crash between the order write and the ledger call).
    pub async fn sweep(&self) -> Result<usize, AppError> {
        let outstanding = self.orders.uncredited_completed(SWEEP_BATCH).await?;
        let mut applied = 0;
        for order in &outstanding {
            match self.apply_credit(order).await {
                Ok(true) => applied += 1,
                Ok(false) => {}
                Err(e) => error!("Sweep could not credit order {}: {e}", order.id),
            }
        }
        if applied > 0 {
            info!("Reconciliation sweep credited {applied} order(s)");
        }
        Ok(applied)
    }

    async fn apply_credit(&self, order: &OrderRow) -> Result<bool, AppError> {
        match self.ledger.credit_order(order.id).await {
            Ok(entry) => Ok(entry.is_some()),
            Err(e) => Err(AppError::Reconciliation(format!(
                "ledger credit for order {} failed: {e}",
                order.id
            ))),
        }
    }

    pub async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<OrderRow>, AppError> {
        self.orders.list_for_user(user_id).await
    }
}

/// Runs `sweep` forever on a fixed interval.
pub async fn run_sweeper(reconciler: Reconciler, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        if let Err(e) = reconciler.sweep().await {
            error!("Reconciliation sweep failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU8, Ordering};

    use crate::ledger::LedgerStore;
    use crate::memory::MemoryStore;
    use crate::models::account::LedgerEntryRow;

    fn notification(reference: &str, user: Uuid, status: OrderStatus) -> PaymentNotification {
        PaymentNotification {
            payment_reference: reference.to_string(),
            user_id: user,
            package_type: PackageType::CareerBoost,
            credits_purchased: 5,
            amount: 1_250_000,
            currency: "ngn".to_string(),
            status,
        }
    }

    fn reconciler(store: Arc<MemoryStore>) -> (Reconciler, Ledger) {
        let ledger = Ledger::new(store.clone());
        (Reconciler::new(store, ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn test_duplicate_completion_credits_once() {
        let store = Arc::new(MemoryStore::new());
        let (reconciler, ledger) = reconciler(store.clone());
        let user = Uuid::new_v4();

        let first = reconciler
            .handle(notification("PR-123", user, OrderStatus::Completed))
            .await
            .unwrap();
        let second = reconciler
            .handle(notification("PR-123", user, OrderStatus::Completed))
            .await
            .unwrap();

        assert!(first.credited);
        assert!(!second.credited);
        assert_eq!(first.order.id, second.order.id);
        assert_eq!(ledger.balance(user).await.unwrap(), 5);

        let orders = reconciler.orders_for_user(user).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Completed);
        assert_eq!(orders[0].currency, "NGN");
    }

    #[tokio::test]
    async fn test_pending_then_completed_credits_on_transition() {
        let store = Arc::new(MemoryStore::new());
        let (reconciler, ledger) = reconciler(store);
        let user = Uuid::new_v4();

        let pending = reconciler
            .handle(notification("PR-9", user, OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.order.status, OrderStatus::Pending);
        assert_eq!(ledger.balance(user).await.unwrap(), 0);

        let done = reconciler
            .handle(notification("PR-9", user, OrderStatus::Completed))
            .await
            .unwrap();
        assert_eq!(done.order.id, pending.order.id);
        assert!(done.credited);
        assert_eq!(ledger.balance(user).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_completion_of_failed_order_is_reconciliation_error() {
        let store = Arc::new(MemoryStore::new());
        let (reconciler, ledger) = reconciler(store);
        let user = Uuid::new_v4();

        reconciler
            .handle(notification("PR-7", user, OrderStatus::Failed))
            .await
            .unwrap();
        let err = reconciler
            .handle(notification("PR-7", user, OrderStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Reconciliation(_)));
        assert_eq!(ledger.balance(user).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_notice_never_reverts_completed_order() {
        let store = Arc::new(MemoryStore::new());
        let (reconciler, ledger) = reconciler(store);
        let user = Uuid::new_v4();

        reconciler
            .handle(notification("PR-5", user, OrderStatus::Completed))
            .await
            .unwrap();
        let after = reconciler
            .handle(notification("PR-5", user, OrderStatus::Failed))
            .await
            .unwrap();
        assert_eq!(after.order.status, OrderStatus::Completed);
        assert_eq!(ledger.balance(user).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_reference_owned_by_other_user_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (reconciler, _) = reconciler(store);
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();

        reconciler
            .handle(notification("PR-1", owner, OrderStatus::Pending))
            .await
            .unwrap();
        let err = reconciler
            .handle(notification("PR-1", intruder, OrderStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Reconciliation(_)));
    }

    #[tokio::test]
    async fn test_invalid_notification_is_validation_error() {
        let store = Arc::new(MemoryStore::new());
        let (reconciler, _) = reconciler(store);
        let mut n = notification("PR-2", Uuid::new_v4(), OrderStatus::Completed);
        n.credits_purchased = 0;
        assert!(matches!(
            reconciler.handle(n).await,
            Err(AppError::Validation(_))
        ));
    }

    const UP: u8 = 0;
    /// Order credits fail before anything is written.
    const DOWN: u8 = 1;
    /// Order credits commit, then the caller sees an error.
    const LOST_ACK: u8 = 2;

    /// Ledger store whose order credits misbehave until switched back up.
    struct FlakyLedger {
        inner: Arc<MemoryStore>,
        mode: AtomicU8,
    }

    impl FlakyLedger {
        fn new(inner: Arc<MemoryStore>, mode: u8) -> Arc<Self> {
            Arc::new(Self {
                inner,
                mode: AtomicU8::new(mode),
            })
        }
    }

    #[async_trait]
    impl LedgerStore for FlakyLedger {
        async fn balance(&self, user_id: Uuid) -> Result<Option<i32>, AppError> {
            self.inner.balance(user_id).await
        }
        async fn debit(
            &self,
            user_id: Uuid,
            amount: i32,
            cause_id: Uuid,
        ) -> Result<Option<LedgerEntryRow>, AppError> {
            self.inner.debit(user_id, amount, cause_id).await
        }
        async fn credit(
            &self,
            user_id: Uuid,
            amount: i32,
            cause_id: Uuid,
        ) -> Result<LedgerEntryRow, AppError> {
            self.inner.credit(user_id, amount, cause_id).await
        }
        async fn credit_order(&self, order_id: Uuid) -> Result<Option<LedgerEntryRow>, AppError> {
            match self.mode.load(Ordering::SeqCst) {
                DOWN => Err(AppError::Internal(anyhow::anyhow!("ledger unavailable"))),
                LOST_ACK => {
                    self.inner.credit_order(order_id).await?;
                    Err(AppError::Internal(anyhow::anyhow!("connection reset")))
                }
                _ => self.inner.credit_order(order_id).await,
            }
        }
        async fn entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntryRow>, AppError> {
            self.inner.entries(user_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_credit_is_retried_until_consistent() {
        let store = Arc::new(MemoryStore::new());
        let flaky = FlakyLedger::new(store.clone(), DOWN);
        let ledger = Ledger::new(flaky.clone());
        let reconciler = Reconciler::new(store.clone(), ledger.clone());
        let user = Uuid::new_v4();

        let err = reconciler
            .handle(notification("PR-123", user, OrderStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Reconciliation(_)));
        // The order is durable even though the credit failed.
        let order = store.find_by_reference("PR-123").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert!(order.credited_at.is_none());
        assert_eq!(ledger.balance(user).await.unwrap(), 0);

        flaky.mode.store(UP, Ordering::SeqCst);
        let retry = reconciler
            .handle(notification("PR-123", user, OrderStatus::Completed))
            .await
            .unwrap();
        assert!(retry.credited);
        assert_eq!(ledger.balance(user).await.unwrap(), 5);

        // Nothing left for the sweeper.
        assert_eq!(reconciler.sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_credit_is_picked_up_by_sweep() {
        let store = Arc::new(MemoryStore::new());
        let flaky = FlakyLedger::new(store.clone(), DOWN);
        let ledger = Ledger::new(flaky.clone());
        let reconciler = Reconciler::new(store.clone(), ledger.clone());
        let user = Uuid::new_v4();

        assert!(reconciler
            .handle(notification("PR-77", user, OrderStatus::Completed))
            .await
            .is_err());
        // Still down: the sweep reports nothing applied and leaves the order owed.
        assert_eq!(reconciler.sweep().await.unwrap(), 0);
        assert_eq!(store.uncredited_completed(10).await.unwrap().len(), 1);

        flaky.mode.store(UP, Ordering::SeqCst);
        assert_eq!(reconciler.sweep().await.unwrap(), 1);
        assert_eq!(ledger.balance(user).await.unwrap(), 5);

        let redelivery = reconciler
            .handle(notification("PR-77", user, OrderStatus::Completed))
            .await
            .unwrap();
        assert!(!redelivery.credited);
        assert_eq!(ledger.balance(user).await.unwrap(), 5);
        assert_eq!(ledger.history(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lost_acknowledgement_never_credits_twice() {
        let store = Arc::new(MemoryStore::new());
        let flaky = FlakyLedger::new(store.clone(), LOST_ACK);
        let ledger = Ledger::new(flaky.clone());
        let reconciler = Reconciler::new(store.clone(), ledger.clone());
        let user = Uuid::new_v4();

        assert!(reconciler
            .handle(notification("PR-88", user, OrderStatus::Completed))
            .await
            .is_err());
        assert_eq!(ledger.balance(user).await.unwrap(), 5);

        flaky.mode.store(UP, Ordering::SeqCst);
        let redelivery = reconciler
            .handle(notification("PR-88", user, OrderStatus::Completed))
            .await
            .unwrap();
        assert!(!redelivery.credited);
        assert_eq!(reconciler.sweep().await.unwrap(), 0);
        assert_eq!(ledger.balance(user).await.unwrap(), 5);

        let history = ledger.history(user).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].cause_id, redelivery.order.id);
    }

    #[tokio::test]
    async fn test_unsettled_notice_for_other_users_reference_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let (reconciler, _) = reconciler(store.clone());
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();

        reconciler
            .handle(notification("PR-3", owner, OrderStatus::Pending))
            .await
            .unwrap();
        for status in [OrderStatus::Pending, OrderStatus::Failed] {
            let err = reconciler
                .handle(notification("PR-3", intruder, status))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Reconciliation(_)));
        }

        let order = store.find_by_reference("PR-3").await.unwrap().unwrap();
        assert_eq!(order.user_id, owner);
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_sweep_credits_orphaned_completed_orders() {
        let store = Arc::new(MemoryStore::new());
        let (reconciler, ledger) = reconciler(store.clone());
        let user = Uuid::new_v4();

        // Order written without the credit step, as after a crash.
        let (order, _) = notification("PR-42", user, OrderStatus::Completed)
            .into_new_order()
            .unwrap();
        store.apply(&order, OrderStatus::Completed).await.unwrap();

        assert_eq!(reconciler.sweep().await.unwrap(), 1);
        assert_eq!(ledger.balance(user).await.unwrap(), 5);
        assert_eq!(reconciler.sweep().await.unwrap(), 0);
        assert_eq!(ledger.balance(user).await.unwrap(), 5);
    }

    #[test]
    fn test_notification_accepts_camel_case_and_display_package() {
        let json = serde_json::json!({
            "paymentReference": "PR-123",
            "userId": Uuid::new_v4(),
            "packageType": "Career Boost",
            "creditsPurchased": 5,
            "amount": 1250000,
            "currency": "NGN",
            "status": "completed"
        });
        let n: PaymentNotification = serde_json::from_value(json).unwrap();
        assert_eq!(n.package_type, PackageType::CareerBoost);
        assert_eq!(n.status, OrderStatus::Completed);
    }
}
