/// Invite token repository.
///
/// Invites are server-generated opaque UUID tokens mailed to the invitee.
/// Each carries the role the accepting user will receive.
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct InviteToken {
    pub id: i64,
    pub token: Uuid,
    pub user_id: i64,
    pub role_id: i64,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    pool: &PgPool,
    user_id: i64,
    role_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<InviteToken> {
    let invite = sqlx::query_as::<_, InviteToken>(
        "INSERT INTO invite_tokens (user_id, role_id, expires_at) VALUES ($1, $2, $3) \
         RETURNING id, token, user_id, role_id, is_used, expires_at, created_at",
    )
    .bind(user_id)
    .bind(role_id)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;
    Ok(invite)
}

pub async fn find_valid(pool: &PgPool, token: Uuid) -> Result<Option<InviteToken>> {
    let invite = sqlx::query_as::<_, InviteToken>(
        "SELECT id, token, user_id, role_id, is_used, expires_at, created_at \
         FROM invite_tokens \
         WHERE token = $1 AND is_used = FALSE AND expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(invite)
}

pub async fn mark_used(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE invite_tokens SET is_used = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
