/// Authorization guards layered behind `require_auth`.
///
/// Each guard is an `axum::middleware::from_fn_with_state` function whose
/// state is a tuple of the shared app state and the route's static
/// requirement list, so a route declares its needs at router construction:
///
/// ```ignore
/// .layer(middleware::from_fn_with_state(
///     (state.clone(), &["user.invite"][..]),
///     guards::require_permission,
/// ))
/// ```
///
/// Guards run after `require_auth` and read its [`AuthContext`] extension;
/// a missing context is a router wiring bug and reported as an internal
/// error, never as a pass. Role and permission sets are fetched from the
/// store on every request, not taken from the token claims, so revoking or
/// soft-deleting a role takes effect immediately instead of at token expiry.
use crate::db;
use crate::error::{AuthError, Result};
use crate::http::auth::AuthContext;
use crate::{authz, AppState};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

fn context(req: &Request) -> Result<&AuthContext> {
    req.extensions()
        .get::<AuthContext>()
        .ok_or_else(|| AuthError::Internal("auth context missing, guard ordering bug".to_string()))
}

/// Pass when the caller currently holds any of `required` roles (or
/// `super_admin`).
pub async fn require_role(
    State((state, required)): State<(Arc<AppState>, &'static [&'static str])>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let ctx = context(&req)?;
    let roles = db::roles::user_role_names(&state.db, ctx.user_id).await?;
    if !authz::role_allowed(&roles, required) {
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(req).await)
}

/// Pass when the caller currently holds any of `required` permissions,
/// directly or via a `module.*` wildcard (or holds `super_admin`, which
/// skips the permission lookup entirely).
pub async fn require_permission(
    State((state, required)): State<(Arc<AppState>, &'static [&'static str])>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let ctx = context(&req)?;
    let roles = db::roles::user_role_names(&state.db, ctx.user_id).await?;

    if roles.iter().any(|r| r == authz::ROLE_SUPER_ADMIN) {
        return Ok(next.run(req).await);
    }

    let held = db::roles::user_permission_names(&state.db, ctx.user_id).await?;
    if !authz::permission_allowed(&roles, &held, required) {
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(req).await)
}

/// Pass when one of the caller's roles carries `required` scope. No
/// override exists for this gate.
pub async fn require_scope(
    State((state, required)): State<(Arc<AppState>, &'static str)>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let ctx = context(&req)?;
    let scopes = db::roles::user_role_scopes(&state.db, ctx.user_id).await?;
    if !authz::scope_allowed(&scopes, required) {
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(req).await)
}
