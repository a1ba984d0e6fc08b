use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::account::AccountRow;
use crate::models::document::DocumentRow;
use crate::models::order::OrderRow;

/// Everything one dashboard needs, read as of a single point in time.
#[derive(Debug, Clone, Default)]
pub struct DashboardRows {
    pub account: Option<AccountRow>,
    pub orders: Vec<OrderRow>,
    pub documents: Vec<DocumentRow>,
}

#[async_trait]
pub trait DashboardStore: Send + Sync {
    /// All reads observe the same committed state. Lists are newest first.
    async fn load(&self, user_id: Uuid) -> Result<DashboardRows, AppError>;
}

#[derive(Clone)]
pub struct PgDashboardStore {
    pool: PgPool,
}

impl PgDashboardStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DashboardStore for PgDashboardStore {
    async fn load(&self, user_id: Uuid) -> Result<DashboardRows, AppError> {
        let mut tx = self.pool.begin().await?;
        // One snapshot for all three reads.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let account = sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let orders = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;
        let documents = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(DashboardRows {
            account,
            orders,
            documents,
        })
    }
}
