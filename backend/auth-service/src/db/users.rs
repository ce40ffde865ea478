/// User repository
use crate::error::Result;
use crate::models::User;
use sqlx::PgPool;

const USER_COLUMNS: &str = "id, uuid, email, full_name, password_hash, is_active, is_banned, \
     is_invited, invited_at, last_login_at, deleted_at, created_at, updated_at";

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Self-registration: the row starts inactive and stays unusable until OTP
/// verification flips it on.
pub async fn create_inactive(
    pool: &PgPool,
    email: &str,
    full_name: &str,
    password_hash: &str,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, full_name, password_hash, is_active) \
         VALUES ($1, $2, $3, FALSE) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(full_name)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

/// Bootstrap/admin creation: active immediately, no OTP step.
pub async fn create_active(
    pool: &PgPool,
    email: &str,
    full_name: &str,
    password_hash: &str,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, full_name, password_hash, is_active) \
         VALUES ($1, $2, $3, TRUE) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(full_name)
    .bind(password_hash)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

/// Invited users exist without a password until the invite is accepted.
pub async fn create_invited(pool: &PgPool, email: &str) -> Result<User> {
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (email, is_active, is_invited, invited_at) \
         VALUES ($1, FALSE, TRUE, NOW()) \
         RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok(user)
}

pub async fn activate(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET is_active = TRUE, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_password(pool: &PgPool, id: i64, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Accepting an invite sets the password and activates in one statement.
pub async fn complete_invite(pool: &PgPool, id: i64, password_hash: &str) -> Result<()> {
    sqlx::query(
        "UPDATE users SET password_hash = $2, is_active = TRUE, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .bind(password_hash)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn touch_last_login(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE users SET last_login_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
