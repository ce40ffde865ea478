/// OTP models
///
/// An OTP is dual-written: the cache copy (JSON under `otp:{email}` with a
/// TTL) is authoritative and checked first; the store row is a durable
/// fallback consulted when the cache is silent or unavailable.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cache-resident copy of an outstanding OTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpCacheRecord {
    pub code: String,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// Durable copy of an outstanding OTP.
#[derive(Debug, Clone, FromRow)]
pub struct StoredOtp {
    pub id: i64,
    pub user_id: i64,
    pub otp_code: String,
    pub attempts: i32,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
