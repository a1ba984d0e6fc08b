use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::account::{AccountRow, ProfileFields};

/// Storage seam for account profiles. Never writes `credits`.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, user_id: Uuid) -> Result<Option<AccountRow>, AppError>;

    /// Creates the account with zero credits if missing, then merges profile
    /// fields. An email that is already set is kept.
    async fn upsert_profile(
        &self,
        user_id: Uuid,
        profile: &ProfileFields,
    ) -> Result<AccountRow, AppError>;
}

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn get_account(&self, user_id: Uuid) -> Result<Option<AccountRow>, AppError> {
        Ok(
            sqlx::query_as::<_, AccountRow>("SELECT * FROM accounts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        profile: &ProfileFields,
    ) -> Result<AccountRow, AppError> {
        Ok(sqlx::query_as::<_, AccountRow>(
            r#"
            INSERT INTO accounts (user_id, full_name, email, phone, credits)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (user_id) DO UPDATE SET
                full_name = COALESCE(EXCLUDED.full_name, accounts.full_name),
                email     = COALESCE(accounts.email, EXCLUDED.email),
                phone     = COALESCE(EXCLUDED.phone, accounts.phone)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(profile.full_name.as_deref())
        .bind(profile.email.as_deref())
        .bind(profile.phone.as_deref())
        .fetch_one(&self.pool)
        .await?)
    }
}
