/// Shared credential login, used by both the app and dashboard surfaces.
///
/// The two login endpoints differ only in the scope they demand; everything
/// else (credential check, token mint, session supersession) is identical
/// and lives here.
use crate::db;
use crate::error::{AuthError, Result};
use crate::models::user::LoginResponse;
use crate::security::password::verify_password;
use crate::validators::normalize_email;
use crate::{authz, AppState};
use tracing::info;

pub async fn authenticate(
    state: &AppState,
    required_scope: &str,
    email: &str,
    password: &str,
) -> Result<LoginResponse> {
    let email = normalize_email(email);

    let user = db::users::find_by_email(&state.db, &email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !user.can_authenticate() {
        return Err(AuthError::AccountDisabled);
    }

    let hash = user
        .password_hash
        .as_deref()
        .ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(password, hash)? {
        return Err(AuthError::InvalidCredentials);
    }

    // Scope is checked before any token exists, so a wrong-surface login
    // never creates or displaces a session.
    let scopes = db::roles::user_role_scopes(&state.db, user.id).await?;
    if !authz::scope_allowed(&scopes, required_scope) {
        return Err(AuthError::Forbidden);
    }

    let roles = db::roles::user_role_names(&state.db, user.id).await?;
    let issued = state.tokens.issue_access(user.id, user.uuid, roles)?;

    // Installing the new JTI revokes whatever session was live before.
    db::sessions::set_active(&state.db, user.id, &issued.jti, issued.expires_at).await?;
    db::users::touch_last_login(&state.db, user.id).await?;

    info!(user_id = user.id, scope = required_scope, "login succeeded");

    Ok(LoginResponse {
        access_token: issued.token,
        expires_at: issued.expires_at,
    })
}
