/// Password reset token repository.
///
/// Same shape as invites: opaque single-use UUID tokens with a short TTL,
/// mailed to the account address.
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: i64,
    pub token: Uuid,
    pub user_id: i64,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    pool: &PgPool,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<PasswordResetToken> {
    let reset = sqlx::query_as::<_, PasswordResetToken>(
        "INSERT INTO password_reset_tokens (user_id, expires_at) VALUES ($1, $2) \
         RETURNING id, token, user_id, is_used, expires_at, created_at",
    )
    .bind(user_id)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;
    Ok(reset)
}

/// Outstanding token for the user, so repeated requests reuse one link.
pub async fn find_outstanding_for_user(
    pool: &PgPool,
    user_id: i64,
) -> Result<Option<PasswordResetToken>> {
    let reset = sqlx::query_as::<_, PasswordResetToken>(
        "SELECT id, token, user_id, is_used, expires_at, created_at \
         FROM password_reset_tokens \
         WHERE user_id = $1 AND is_used = FALSE AND expires_at > NOW() \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(reset)
}

pub async fn find_valid(pool: &PgPool, token: Uuid) -> Result<Option<PasswordResetToken>> {
    let reset = sqlx::query_as::<_, PasswordResetToken>(
        "SELECT id, token, user_id, is_used, expires_at, created_at \
         FROM password_reset_tokens \
         WHERE token = $1 AND is_used = FALSE AND expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(reset)
}

pub async fn mark_used(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE password_reset_tokens SET is_used = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
