use tracing::info;
use uuid::Uuid;

use crate::accounts::store::AccountStore;
use crate::errors::AppError;
use crate::models::account::{AccountRow, ProfileFields};

/// Idempotent provisioning called from the identity boundary.
pub async fn ensure_account(
    store: &dyn AccountStore,
    user_id: Uuid,
    profile: ProfileFields,
) -> Result<AccountRow, AppError> {
    let profile = normalize(profile);
    if let Some(existing) = store.get_account(user_id).await? {
        check_email_unchanged(&existing, &profile)?;
    }
    let account = store.upsert_profile(user_id, &profile).await?;
    info!("Account {user_id} provisioned");
    Ok(account)
}

/// Updates display fields on an existing account. Email is immutable once set.
pub async fn update_profile(
    store: &dyn AccountStore,
    user_id: Uuid,
    profile: ProfileFields,
) -> Result<AccountRow, AppError> {
    let profile = normalize(profile);
    let existing = store
        .get_account(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {user_id} not found")))?;
    check_email_unchanged(&existing, &profile)?;
    store.upsert_profile(user_id, &profile).await
}

fn check_email_unchanged(existing: &AccountRow, profile: &ProfileFields) -> Result<(), AppError> {
    match (&existing.email, &profile.email) {
        (Some(current), Some(requested)) if !current.eq_ignore_ascii_case(requested) => Err(
            AppError::Validation("email cannot be changed once set".to_string()),
        ),
        _ => Ok(()),
    }
}

/// Blank strings mean "not provided".
fn normalize(profile: ProfileFields) -> ProfileFields {
    let clean = |v: Option<String>| {
        v.map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    ProfileFields {
        full_name: clean(profile.full_name),
        email: clean(profile.email),
        phone: clean(profile.phone),
    }
}
