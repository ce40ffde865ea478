/// OTP store repository, the durable fallback behind the cache copy.
use crate::error::Result;
use crate::models::StoredOtp;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Latest unused, unexpired code for the user, if any.
pub async fn find_valid(pool: &PgPool, user_id: i64) -> Result<Option<StoredOtp>> {
    let otp = sqlx::query_as::<_, StoredOtp>(
        "SELECT id, user_id, otp_code, attempts, is_used, expires_at, created_at \
         FROM otp_codes \
         WHERE user_id = $1 AND is_used = FALSE AND expires_at > NOW() \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(otp)
}

pub async fn insert(
    pool: &PgPool,
    user_id: i64,
    code: &str,
    expires_at: DateTime<Utc>,
) -> Result<StoredOtp> {
    let otp = sqlx::query_as::<_, StoredOtp>(
        "INSERT INTO otp_codes (user_id, otp_code, expires_at) VALUES ($1, $2, $3) \
         RETURNING id, user_id, otp_code, attempts, is_used, expires_at, created_at",
    )
    .bind(user_id)
    .bind(code)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;
    Ok(otp)
}

pub async fn increment_attempts(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE otp_codes SET attempts = attempts + 1 WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_used(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE otp_codes SET is_used = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
