/// Active session model
///
/// At most one row per user: the JTI currently considered live. Overwriting
/// it is how a new login invalidates every prior session.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActiveSession {
    pub user_id: i64,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ActiveSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
