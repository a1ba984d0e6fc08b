use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::ledger::store::LedgerStore;
use crate::models::account::LedgerEntryRow;

/// The single point of truth for "can this user submit now".
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn LedgerStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Unknown users read as a zero balance.
    pub async fn balance(&self, user_id: Uuid) -> Result<i32, AppError> {
        Ok(self.store.balance(user_id).await?.unwrap_or(0))
    }

    pub async fn can_submit(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.balance(user_id).await? > 0)
    }

    /// Atomically removes `amount` credits. Fails with `InsufficientCredit`
    /// and leaves the balance untouched when it cannot be covered.
    pub async fn debit(
        &self,
        user_id: Uuid,
        amount: i32,
        cause_id: Uuid,
    ) -> Result<LedgerEntryRow, AppError> {
        ensure_positive(amount)?;
        let entry = self
            .store
            .debit(user_id, amount, cause_id)
            .await?
            .ok_or(AppError::InsufficientCredit)?;
        info!(
            "Debited {amount} credit(s) from user {user_id} for {cause_id}; balance now {}",
            entry.resulting_balance
        );
        Ok(entry)
    }

    /// Adds `amount` credits. Exactly-once semantics are the caller's job.
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: i32,
        cause_id: Uuid,
    ) -> Result<LedgerEntryRow, AppError> {
        ensure_positive(amount)?;
        let entry = self.store.credit(user_id, amount, cause_id).await?;
        info!(
            "Credited {amount} credit(s) to user {user_id} for {cause_id}; balance now {}",
            entry.resulting_balance
        );
        Ok(entry)
    }

    /// Applies a completed order's credits. `None` means nothing was owed:
    /// the order is already credited or not completed.
    pub async fn credit_order(&self, order_id: Uuid) -> Result<Option<LedgerEntryRow>, AppError> {
        let entry = self.store.credit_order(order_id).await?;
        if let Some(entry) = &entry {
            info!(
                "Credited {} credit(s) to user {} for order {order_id}; balance now {}",
                entry.delta, entry.user_id, entry.resulting_balance
            );
        }
        Ok(entry)
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<LedgerEntryRow>, AppError> {
        self.store.entries(user_id).await
    }
}

fn ensure_positive(amount: i32) -> Result<(), AppError> {
    if amount <= 0 {
        return Err(AppError::Validation(format!(
            "credit amount must be a positive integer, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use proptest::prelude::*;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_unknown_user_has_zero_balance() {
        let ledger = ledger();
        assert_eq!(ledger.balance(Uuid::new_v4()).await.unwrap(), 0);
        assert!(!ledger.can_submit(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_credit_then_debit() {
        let ledger = ledger();
        let user = Uuid::new_v4();
        ledger.credit(user, 5, Uuid::new_v4()).await.unwrap();
        let entry = ledger.debit(user, 1, Uuid::new_v4()).await.unwrap();
        assert_eq!(entry.delta, -1);
        assert_eq!(entry.resulting_balance, 4);
        assert_eq!(ledger.balance(user).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_debit_without_funds_is_rejected_and_not_logged() {
        let ledger = ledger();
        let user = Uuid::new_v4();
        let err = ledger.debit(user, 1, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientCredit));
        assert_eq!(ledger.balance(user).await.unwrap(), 0);
        assert!(ledger.history(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_amounts_rejected() {
        let ledger = ledger();
        let user = Uuid::new_v4();
        assert!(matches!(
            ledger.credit(user, 0, Uuid::new_v4()).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            ledger.debit(user, -3, Uuid::new_v4()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_history_is_newest_first_with_causes() {
        let ledger = ledger();
        let user = Uuid::new_v4();
        let order = Uuid::new_v4();
        let doc = Uuid::new_v4();
        ledger.credit(user, 2, order).await.unwrap();
        ledger.debit(user, 1, doc).await.unwrap();

        let history = ledger.history(user).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].cause_id, doc);
        assert_eq!(history[1].cause_id, order);
    }

    #[tokio::test]
    async fn test_concurrent_debits_never_overdraw() {
        let ledger = ledger();
        let user = Uuid::new_v4();
        ledger.credit(user, 3, Uuid::new_v4()).await.unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.debit(user, 1, Uuid::new_v4()).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 3);
        assert_eq!(ledger.balance(user).await.unwrap(), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Credit(i32),
        Debit(i32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1..=10i32).prop_map(Op::Credit),
            (1..=10i32).prop_map(Op::Debit),
        ]
    }

    proptest! {
        #[test]
        fn prop_balance_never_negative(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let ledger = ledger();
                let user = Uuid::new_v4();
                let mut expected = 0i32;
                for op in ops {
                    match op {
                        Op::Credit(n) => {
                            ledger.credit(user, n, Uuid::new_v4()).await.unwrap();
                            expected += n;
                        }
                        Op::Debit(n) => match ledger.debit(user, n, Uuid::new_v4()).await {
                            Ok(_) => expected -= n,
                            Err(AppError::InsufficientCredit) => assert!(expected < n),
                            Err(e) => panic!("unexpected error: {e}"),
                        },
                    }
                    let balance = ledger.balance(user).await.unwrap();
                    assert!(balance >= 0);
                    assert_eq!(balance, expected);
                }
            });
        }
    }
}
