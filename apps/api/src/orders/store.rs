use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::order::{NewOrder, OrderRow, OrderStatus};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_by_reference(&self, reference: &str) -> Result<Option<OrderRow>, AppError>;

    /// Creates the order in `status` if its payment reference is new. An
    /// existing `pending` order owned by the same user moves to `status`.
    /// Anything else is left alone. Always returns the stored row.
    async fn apply(&self, order: &NewOrder, status: OrderStatus) -> Result<OrderRow, AppError>;

    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderRow>, AppError>;

    /// Completed orders whose credit has not been applied, oldest first.
    async fn uncredited_completed(&self, limit: i64) -> Result<Vec<OrderRow>, AppError>;
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn find_by_reference(&self, reference: &str) -> Result<Option<OrderRow>, AppError> {
        Ok(
            sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE payment_reference = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn apply(&self, order: &NewOrder, status: OrderStatus) -> Result<OrderRow, AppError> {
        let applied = sqlx::query_as::<_, OrderRow>(
            r#"
            INSERT INTO orders
                (id, user_id, payment_reference, package_type, credits_purchased,
                 amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (payment_reference) DO UPDATE
                SET status = EXCLUDED.status
                WHERE orders.status = 'pending'
                  AND orders.user_id = EXCLUDED.user_id
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.user_id)
        .bind(&order.payment_reference)
        .bind(order.package_type)
        .bind(order.credits_purchased)
        .bind(order.amount)
        .bind(&order.currency)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        match applied {
            Some(row) => Ok(row),
            None => self
                .find_by_reference(&order.payment_reference)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "order {} vanished during upsert",
                        order.payment_reference
                    ))
                }),
        }
    }
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderRow>, AppError> {
        Ok(sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn uncredited_completed(&self, limit: i64) -> Result<Vec<OrderRow>, AppError> {
        Ok(sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT * FROM orders
            WHERE status = 'completed' AND credited_at IS NULL
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
