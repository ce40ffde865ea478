/// Password recovery and rotation.
///
/// Every path that installs a new password also kills the user's live
/// session: a credential change must invalidate whatever tokens were
/// minted under the old one.
use crate::db;
use crate::error::{AuthError, Result};
use crate::http::auth::AuthContext;
use crate::models::user::{
    ChangePasswordRequest, ForgotPasswordRequest, MessageResponse, ResetPasswordRequest,
};
use crate::security::password::{hash_password, verify_password};
use crate::validators::normalize_email;
use crate::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Request a reset link. The response is identical whether or not the
/// address exists, so the endpoint cannot be used to enumerate accounts.
/// Repeated requests reuse the outstanding token instead of minting a
/// fresh one per call.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;
    let email = normalize_email(&req.email);

    if let Some(user) = db::users::find_by_email(&state.db, &email).await? {
        if user.can_authenticate() {
            let reset = match db::password_reset::find_outstanding_for_user(&state.db, user.id)
                .await?
            {
                Some(existing) => existing,
                None => {
                    let expires_at =
                        Utc::now() + Duration::seconds(state.settings.password_reset_ttl_secs);
                    db::password_reset::insert(&state.db, user.id, expires_at).await?
                }
            };

            let email_service = state.email.clone();
            let token = reset.token.to_string();
            tokio::spawn(async move {
                email_service.send_password_reset(&email, &token).await;
            });
        }
    }

    Ok(Json(MessageResponse::new(
        "If the address exists, a reset link has been sent",
    )))
}

/// Redeem a reset token. The token is burned, the new password installed,
/// and any live session revoked.
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;

    let token: Uuid = req.token.parse().map_err(|_| AuthError::InvalidToken)?;
    let reset = db::password_reset::find_valid(&state.db, token)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let hash = hash_password(&req.new_password)?;
    db::users::update_password(&state.db, reset.user_id, &hash).await?;
    db::password_reset::mark_used(&state.db, reset.id).await?;

    revoke_live_session(&state, reset.user_id).await?;

    info!(user_id = reset.user_id, "password reset");
    Ok(Json(MessageResponse::new(
        "Password reset, you can now log in",
    )))
}

/// Rotate the password from inside an authenticated session. The session
/// that made the request is revoked along with everything else; the caller
/// must log in again.
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;

    let user = db::users::find_by_id(&state.db, ctx.user_id)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let hash = user
        .password_hash
        .as_deref()
        .ok_or(AuthError::InvalidCredentials)?;
    if !verify_password(&req.old_password, hash)? {
        return Err(AuthError::InvalidCredentials);
    }

    let new_hash = hash_password(&req.new_password)?;
    db::users::update_password(&state.db, ctx.user_id, &new_hash).await?;

    db::token_revocation::revoke(&state.db, &ctx.jti, ctx.user_id, ctx.token_expires_at).await?;
    db::sessions::clear(&state.db, ctx.user_id).await?;

    info!(user_id = ctx.user_id, "password changed");
    Ok(Json(MessageResponse::new(
        "Password changed, please log in again",
    )))
}

/// Tombstone whatever JTI is currently live for the user, then drop the
/// session row.
async fn revoke_live_session(state: &AppState, user_id: i64) -> Result<()> {
    if let Some(session) = db::sessions::find(&state.db, user_id).await? {
        db::token_revocation::revoke(&state.db, &session.jti, user_id, session.expires_at)
            .await?;
        db::sessions::clear(&state.db, user_id).await?;
    }
    Ok(())
}
