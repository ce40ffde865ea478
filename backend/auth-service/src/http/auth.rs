/// Bearer-token authentication middleware.
///
/// A token is honored only when every check passes, in order: parseable
/// signature, `access` type, JTI not revoked, JTI equal to the user's
/// current active session, and the account still able to authenticate.
/// The revocation lookup fails closed: if the ledger cannot be read, the
/// token is treated as revoked.
use crate::db;
use crate::error::{AuthError, Result};
use crate::security::tokens::TokenType;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Identity of the authenticated caller, injected as a request extension
/// for handlers and downstream guards.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub user_uuid: Uuid,
    pub email: String,
    pub jti: String,
    pub roles: Vec<String>,
    pub token_expires_at: DateTime<Utc>,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = bearer_token(req.headers()).ok_or(AuthError::InvalidToken)?;
    let claims = state.tokens.parse(token)?;

    if claims.token_type != TokenType::Access {
        return Err(AuthError::WrongTokenType);
    }

    let revoked = db::token_revocation::is_revoked(&state.db, &claims.jti)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "revocation lookup failed, rejecting token");
            true
        });
    if revoked {
        return Err(AuthError::TokenRevoked);
    }

    if !db::sessions::is_active(&state.db, claims.user_id, &claims.jti).await? {
        return Err(AuthError::SessionSuperseded);
    }

    let user = db::users::find_by_id(&state.db, claims.user_id)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    if !user.can_authenticate() {
        return Err(AuthError::AccountDisabled);
    }

    let token_expires_at = claims.expires_at();
    req.extensions_mut().insert(AuthContext {
        user_id: user.id,
        user_uuid: user.uuid,
        email: user.email,
        jti: claims.jti,
        roles: claims.roles,
        token_expires_at,
    });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn missing_or_malformed_header_yields_none() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
