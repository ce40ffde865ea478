/// Active-session registry: one live JTI per user.
///
/// `set_active` is the supersession point. It runs in a transaction with
/// the existing row locked so two concurrent logins for the same user
/// serialize: whichever commits second wins, and the loser's JTI ends up
/// tombstoned in `revoked_tokens`.
use crate::error::Result;
use crate::models::ActiveSession;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// Install `jti` as the user's sole active session, revoking whatever JTI
/// held that slot before.
pub async fn set_active(
    pool: &PgPool,
    user_id: i64,
    jti: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    let previous = sqlx::query(
        "SELECT jti, expires_at FROM active_sessions WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(row) = previous {
        let old_jti: String = row.get("jti");
        let old_expires_at: DateTime<Utc> = row.get("expires_at");
        // Tombstone the displaced token under its original expiry so the
        // cleanup job drops it no earlier than the token itself dies.
        if old_jti != jti {
            sqlx::query(
                "INSERT INTO revoked_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3) \
                 ON CONFLICT (jti) DO NOTHING",
            )
            .bind(&old_jti)
            .bind(user_id)
            .bind(old_expires_at)
            .execute(&mut *tx)
            .await?;
        }
    }

    sqlx::query(
        "INSERT INTO active_sessions (user_id, jti, expires_at) VALUES ($1, $2, $3) \
         ON CONFLICT (user_id) DO UPDATE \
         SET jti = EXCLUDED.jti, expires_at = EXCLUDED.expires_at, created_at = NOW()",
    )
    .bind(user_id)
    .bind(jti)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn find(pool: &PgPool, user_id: i64) -> Result<Option<ActiveSession>> {
    let row = sqlx::query_as::<_, ActiveSession>(
        "SELECT user_id, jti, expires_at, created_at FROM active_sessions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Whether `jti` is the user's current session.
pub async fn is_active(pool: &PgPool, user_id: i64, jti: &str) -> Result<bool> {
    let row = find(pool, user_id).await?;
    Ok(matches!(row, Some(s) if s.jti == jti && !s.is_expired()))
}

/// Remove the user's session row, used by logout and password resets.
pub async fn clear(pool: &PgPool, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM active_sessions WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
