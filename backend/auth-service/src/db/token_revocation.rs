/// Revocation ledger.
///
/// Revocation is permanent for the lifetime of the token: tombstones carry
/// the token's own expiry and are only purged after that instant. Lookups
/// fail closed at the call sites (an unreadable ledger reads as revoked).
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Idempotent: revoking an already-revoked JTI is a no-op.
pub async fn revoke(
    pool: &PgPool,
    jti: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO revoked_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3) \
         ON CONFLICT (jti) DO NOTHING",
    )
    .bind(jti)
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn is_revoked(pool: &PgPool, jti: &str) -> Result<bool> {
    let revoked = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM revoked_tokens WHERE jti = $1)",
    )
    .bind(jti)
    .fetch_one(pool)
    .await?;
    Ok(revoked)
}

/// Purge tombstones whose tokens have expired on their own. Returns the
/// number of rows removed.
pub async fn cleanup_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
