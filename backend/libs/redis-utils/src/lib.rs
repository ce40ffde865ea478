//! Shared Redis connection management for Shopedia services.
//!
//! The cache layer is best-effort throughout the backend: callers must
//! tolerate total unavailability. Every command issued through this crate
//! is bounded by [`with_timeout`] so a slow cache degrades into an absent
//! cache instead of a stalled request.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::Client;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::info;

/// Shared Redis connection manager guarded by a Tokio mutex.
///
/// The manager itself is cheaply cloneable; the mutex only protects the
/// handle handed out to callers, which clone it before issuing commands.
pub type SharedConnectionManager = Arc<Mutex<ConnectionManager>>;

/// Deadline applied to every Redis command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis connection pool built around a multiplexed [`ConnectionManager`].
pub struct RedisPool {
    manager: SharedConnectionManager,
}

impl RedisPool {
    /// Connect to Redis using a `redis://` connection string.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client =
            Client::open(redis_url).context("failed to parse Redis connection string")?;

        let manager = ConnectionManager::new(client)
            .await
            .context("failed to establish Redis connection")?;

        info!("Redis connection manager initialized");

        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
        })
    }

    /// Hand out the shared connection manager.
    pub fn manager(&self) -> SharedConnectionManager {
        Arc::clone(&self.manager)
    }

    /// Round-trip a PING to verify the connection is alive.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.lock().await.clone();
        with_timeout(async {
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
        })
        .await
        .context("Redis PING failed")?;
        Ok(())
    }
}

/// Run a Redis command future under [`COMMAND_TIMEOUT`].
///
/// A command that exceeds the deadline is reported as an IO error, which
/// callers treat the same as an unreachable cache.
pub async fn with_timeout<T, F>(fut: F) -> Result<T, redis::RedisError>
where
    F: Future<Output = Result<T, redis::RedisError>>,
{
    match timeout(COMMAND_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "redis command timed out",
        ))),
    }
}
