/// Fixed-window rate limiting over Redis.
///
/// The counter key is `ratelimit:{path}:{ip}`, incremented per request; the
/// first increment in a window sets the expiry. The limiter fails open: with
/// no Redis configured, or any cache error, the request proceeds. This is
/// the inverse of the revocation check, which fails closed, because a flaky
/// cache must not lock out every login while a flaky store must never let a
/// revoked token through.
use crate::error::{AuthError, Result};
use crate::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use redis_utils::with_timeout;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window_secs: i64,
}

/// Default for the public auth endpoints: 10 requests per minute per IP.
pub const PUBLIC_AUTH_LIMIT: RateLimitConfig = RateLimitConfig {
    max_requests: 10,
    window_secs: 60,
};

/// Full request path even when the limiter sits inside a nested router.
fn request_path(req: &Request) -> String {
    req.extensions()
        .get::<axum::extract::OriginalUri>()
        .map(|original| original.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}

fn client_ip(req: &Request) -> &str {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
}

pub async fn fixed_window(
    State((state, config)): State<(Arc<AppState>, RateLimitConfig)>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let Some(redis) = state.redis.as_ref() else {
        return Ok(next.run(req).await);
    };

    let key = format!("ratelimit:{}:{}", request_path(&req), client_ip(&req));
    let mut conn = redis.lock().await.clone();

    let count: u64 = match with_timeout(async {
        redis::cmd("INCR").arg(&key).query_async(&mut conn).await
    })
    .await
    {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "rate limit counter unavailable, allowing request");
            return Ok(next.run(req).await);
        }
    };

    if count == 1 {
        if let Err(e) = with_timeout(async {
            redis::cmd("EXPIRE")
                .arg(&key)
                .arg(config.window_secs)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await
        {
            warn!(error = %e, "failed to set rate limit window");
        }
    }

    if count > config.max_requests {
        return Err(AuthError::RateLimited);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    #[test]
    fn forwarded_header_wins_and_first_hop_is_used() {
        let req = HttpRequest::builder()
            .uri("/api/app/login")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn missing_header_falls_back_to_unknown() {
        let req = HttpRequest::builder()
            .uri("/api/app/login")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "unknown");
    }
}
