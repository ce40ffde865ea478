/// OTP lifecycle: issue, resend, verify.
///
/// Codes are dual-written. The cache copy under `otp:{email}` carries the
/// TTL and the attempt counter and is the first thing consulted; the store
/// row is the durable fallback used when the cache misses or the cache is
/// down. Issuing is idempotent: while an unexpired code is outstanding,
/// re-registering or requesting a resend returns the existing expiry and
/// mints nothing new.
use crate::db;
use crate::error::{AuthError, Result};
use crate::models::OtpCacheRecord;
use crate::services::email::EmailService;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use redis::AsyncCommands;
use redis_utils::{with_timeout, SharedConnectionManager};
use sqlx::PgPool;
use tracing::{debug, warn};

/// A code dies after this many wrong guesses, even if its TTL has time left.
pub const MAX_OTP_ATTEMPTS: i32 = 3;

pub const OTP_CODE_LEN: usize = 6;

fn cache_key(email: &str) -> String {
    format!("otp:{email}")
}

/// Uniform six digits from the OS entropy source. Leading zeros are legal,
/// so the code is built digit by digit rather than formatted from an int.
pub fn generate_code() -> String {
    let mut rng = OsRng;
    (0..OTP_CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

#[derive(Clone)]
pub struct OtpService {
    db: PgPool,
    redis: Option<SharedConnectionManager>,
    email: EmailService,
    ttl: Duration,
}

impl OtpService {
    pub fn new(
        db: PgPool,
        redis: Option<SharedConnectionManager>,
        email: EmailService,
        ttl_secs: i64,
    ) -> Self {
        Self {
            db,
            redis,
            email,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Ensure the user has an outstanding code and return its expiry.
    ///
    /// A fresh code is mailed out of band; delivery failures never fail the
    /// request.
    pub async fn issue(&self, user_id: i64, email: &str) -> Result<DateTime<Utc>> {
        if let Some(expires_at) = self.outstanding_expiry(user_id, email).await? {
            debug!(user_id, "reusing outstanding otp");
            return Ok(expires_at);
        }

        let code = generate_code();
        let expires_at = Utc::now() + self.ttl;

        db::otp::insert(&self.db, user_id, &code, expires_at).await?;
        self.cache_put(email, &code).await;

        let email_service = self.email.clone();
        let to = email.to_string();
        tokio::spawn(async move {
            email_service.send_otp_code(&to, &code).await;
        });

        Ok(expires_at)
    }

    /// Check `code` against the outstanding OTP and consume it on success.
    ///
    /// The attempt cap is enforced before the comparison, so the fourth
    /// guess fails even when it is correct.
    pub async fn verify(&self, user_id: i64, email: &str, code: &str) -> Result<()> {
        match self.verify_against_cache(user_id, email, code).await {
            Some(result) => result,
            None => self.verify_against_store(user_id, email, code).await,
        }
    }

    /// Expiry of any valid outstanding code, cache first then store.
    async fn outstanding_expiry(
        &self,
        user_id: i64,
        email: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        if let Some(record) = self.cache_get(email).await {
            if record.attempts < MAX_OTP_ATTEMPTS {
                return Ok(Some(record.created_at + self.ttl));
            }
        }
        match db::otp::find_valid(&self.db, user_id).await? {
            Some(stored) if stored.attempts < MAX_OTP_ATTEMPTS => Ok(Some(stored.expires_at)),
            _ => Ok(None),
        }
    }

    /// `None` means the cache had nothing to say (miss or unavailable) and
    /// the store decides.
    async fn verify_against_cache(
        &self,
        user_id: i64,
        email: &str,
        code: &str,
    ) -> Option<Result<()>> {
        let record = self.cache_get(email).await?;

        if record.attempts >= MAX_OTP_ATTEMPTS {
            return Some(Err(AuthError::OtpTooManyAttempts));
        }

        if record.code != code {
            self.cache_bump_attempts(email, &record).await;
            // Keep the durable counter in step so a cache eviction does not
            // reset the budget.
            if let Ok(Some(stored)) = db::otp::find_valid(&self.db, user_id).await {
                if let Err(e) = db::otp::increment_attempts(&self.db, stored.id).await {
                    warn!(user_id, error = %e, "failed to record otp attempt");
                }
            }
            return Some(Err(AuthError::OtpMismatch));
        }

        Some(self.consume(user_id, email).await)
    }

    async fn verify_against_store(&self, user_id: i64, email: &str, code: &str) -> Result<()> {
        let stored = db::otp::find_valid(&self.db, user_id)
            .await?
            .ok_or(AuthError::OtpNotFound)?;

        if stored.attempts >= MAX_OTP_ATTEMPTS {
            return Err(AuthError::OtpTooManyAttempts);
        }

        if stored.otp_code != code {
            db::otp::increment_attempts(&self.db, stored.id).await?;
            return Err(AuthError::OtpMismatch);
        }

        self.consume(user_id, email).await
    }

    /// Successful match: retire the store row and drop the cache copy.
    async fn consume(&self, user_id: i64, email: &str) -> Result<()> {
        if let Some(stored) = db::otp::find_valid(&self.db, user_id).await? {
            db::otp::mark_used(&self.db, stored.id).await?;
        }
        self.cache_delete(email).await;
        Ok(())
    }

    // -- cache helpers: every failure degrades to "cache absent" ------------

    async fn cache_get(&self, email: &str) -> Option<OtpCacheRecord> {
        let redis = self.redis.as_ref()?;
        let mut conn = redis.lock().await.clone();
        let raw: Option<String> = match with_timeout(conn.get(cache_key(email))).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "otp cache read failed");
                return None;
            }
        };
        raw.and_then(|json| serde_json::from_str(&json).ok())
    }

    async fn cache_put(&self, email: &str, code: &str) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        let record = OtpCacheRecord {
            code: code.to_string(),
            attempts: 0,
            created_at: Utc::now(),
        };
        let json = match serde_json::to_string(&record) {
            Ok(j) => j,
            Err(_) => return,
        };
        let mut conn = redis.lock().await.clone();
        let ttl = self.ttl.num_seconds().max(1) as u64;
        if let Err(e) =
            with_timeout(conn.set_ex::<_, _, ()>(cache_key(email), json, ttl)).await
        {
            warn!(error = %e, "otp cache write failed");
        }
    }

    /// Rewrite the record with a bumped counter while preserving whatever
    /// TTL the key has left.
    async fn cache_bump_attempts(&self, email: &str, record: &OtpCacheRecord) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        let key = cache_key(email);
        let mut conn = redis.lock().await.clone();

        let remaining: i64 = match with_timeout(conn.ttl(&key)).await {
            Ok(ttl) => ttl,
            Err(e) => {
                warn!(error = %e, "otp cache ttl read failed");
                return;
            }
        };
        if remaining <= 0 {
            return;
        }

        let bumped = OtpCacheRecord {
            attempts: record.attempts + 1,
            ..record.clone()
        };
        let json = match serde_json::to_string(&bumped) {
            Ok(j) => j,
            Err(_) => return,
        };
        if let Err(e) =
            with_timeout(conn.set_ex::<_, _, ()>(key, json, remaining as u64)).await
        {
            warn!(error = %e, "otp cache attempt bump failed");
        }
    }

    async fn cache_delete(&self, email: &str) {
        let Some(redis) = self.redis.as_ref() else {
            return;
        };
        let mut conn = redis.lock().await.clone();
        if let Err(e) = with_timeout(conn.del::<_, ()>(cache_key(email))).await {
            warn!(error = %e, "otp cache delete failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), OTP_CODE_LEN);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }

    #[test]
    fn generated_codes_vary() {
        let codes: std::collections::HashSet<String> =
            (0..50).map(|_| generate_code()).collect();
        // 50 draws from a million-code space colliding down to 1 would mean
        // a broken generator.
        assert!(codes.len() > 1);
    }
}
