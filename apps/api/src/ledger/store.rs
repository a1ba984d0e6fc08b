use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::account::LedgerEntryRow;

/// Storage seam for the ledger. Implementations must make `debit` a single
/// atomic check-and-decrement and append the audit row in the same unit of work.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Current balance, or `None` if the account has never been seen.
    async fn balance(&self, user_id: Uuid) -> Result<Option<i32>, AppError>;

    /// Decrements by `amount` only if the balance covers it.
    /// Returns `None` (and writes nothing) when it does not.
    async fn debit(
        &self,
        user_id: Uuid,
        amount: i32,
        cause_id: Uuid,
    ) -> Result<Option<LedgerEntryRow>, AppError>;

    /// Increments by `amount`, creating a zero-balance account first if needed.
    async fn credit(
        &self,
        user_id: Uuid,
        amount: i32,
        cause_id: Uuid,
    ) -> Result<LedgerEntryRow, AppError>;

    /// Credits a completed order's purchase exactly once. Marking the order
    /// credited, raising the balance and writing the audit row commit together.
    /// Returns `None` when the order is not completed or was already credited.
    async fn credit_order(&self, order_id: Uuid) -> Result<Option<LedgerEntryRow>, AppError>;

    /// Audit log for one user, newest first.
    async fn entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntryRow>, AppError>;
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn balance(&self, user_id: Uuid) -> Result<Option<i32>, AppError> {
        Ok(
            sqlx::query_scalar("SELECT credits FROM accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn debit(
        &self,
        user_id: Uuid,
        amount: i32,
        cause_id: Uuid,
    ) -> Result<Option<LedgerEntryRow>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Conditional update: the row lock taken here serialises concurrent debits.
        let balance: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE accounts
            SET credits = credits - $2
            WHERE user_id = $1 AND credits >= $2
            RETURNING credits
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(balance) = balance else {
            tx.rollback().await?;
            return Ok(None);
        };

        let entry = append_audit(&mut tx, user_id, -amount, balance, cause_id).await?;
        tx.commit().await?;
        Ok(Some(entry))
    }

    async fn credit(
        &self,
        user_id: Uuid,
        amount: i32,
        cause_id: Uuid,
    ) -> Result<LedgerEntryRow, AppError> {
        let mut tx = self.pool.begin().await?;
        let balance = add_credits(&mut tx, user_id, amount).await?;
        let entry = append_audit(&mut tx, user_id, amount, balance, cause_id).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn credit_order(&self, order_id: Uuid) -> Result<Option<LedgerEntryRow>, AppError> {
        let mut tx = self.pool.begin().await?;

        // The row lock is held until commit, so a concurrent caller
        // waits and then sees credited_at already set.
        let claimed: Option<(Uuid, i32)> = sqlx::query_as(
            r#"
            UPDATE orders SET credited_at = now()
            WHERE id = $1 AND status = 'completed' AND credited_at IS NULL
            RETURNING user_id, credits_purchased
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id, amount)) = claimed else {
            tx.rollback().await?;
            return Ok(None);
        };

        let balance = add_credits(&mut tx, user_id, amount).await?;
        let entry = append_audit(&mut tx, user_id, amount, balance, order_id).await?;
        tx.commit().await?;
        Ok(Some(entry))
    }

    async fn entries(&self, user_id: Uuid) -> Result<Vec<LedgerEntryRow>, AppError> {
        Ok(sqlx::query_as::<_, LedgerEntryRow>(
            "SELECT * FROM ledger_audit_log WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

/// Upserts the account and returns the new balance.
async fn add_credits(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: i32,
) -> Result<i32, AppError> {
    Ok(sqlx::query_scalar(
        r#"
        INSERT INTO accounts (user_id, credits)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET credits = accounts.credits + EXCLUDED.credits
        RETURNING credits
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .fetch_one(&mut **tx)
    .await?)
}

async fn append_audit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    delta: i32,
    resulting_balance: i32,
    cause_id: Uuid,
) -> Result<LedgerEntryRow, AppError> {
    Ok(sqlx::query_as::<_, LedgerEntryRow>(
        r#"
        INSERT INTO ledger_audit_log (id, user_id, delta, resulting_balance, cause_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(delta)
    .bind(resulting_balance)
    .bind(cause_id)
    .fetch_one(&mut **tx)
    .await?)
}
