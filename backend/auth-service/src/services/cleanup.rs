/// Background purge of expired revocation tombstones.
///
/// Runs once at startup and then on a fixed interval. A failed pass is
/// logged and retried next tick; the ledger only grows in the meantime,
/// which is safe because stale tombstones reject nothing that a fresh
/// expiry check would not.
use crate::db;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

pub async fn run_once(pool: &PgPool) {
    match db::token_revocation::cleanup_expired(pool).await {
        Ok(0) => {}
        Ok(n) => info!(purged = n, "removed expired revocation entries"),
        Err(e) => error!(error = %e, "revocation cleanup failed"),
    }
}

pub fn spawn_revocation_cleanup(pool: PgPool, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            // First tick fires immediately, covering the startup pass.
            ticker.tick().await;
            run_once(&pool).await;
        }
    })
}
