/// Back-office auth handlers (`/api/admin`).
use crate::db;
use crate::error::{AuthError, Result};
use crate::models::user::{
    AcceptInviteRequest, InviteUserRequest, LoginRequest, LoginResponse, MessageResponse,
};
use crate::security::password::hash_password;
use crate::validators::normalize_email;
use crate::{authz, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Bootstrap registration for the dashboard. The account is active
/// immediately (no OTP round) and receives the `super_admin` role.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<crate::models::user::RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    req.validate()?;
    let email = normalize_email(&req.email);

    if db::users::find_by_email(&state.db, &email).await?.is_some() {
        return Err(AuthError::EmailAlreadyExists);
    }

    let hash = hash_password(&req.password)?;
    let user = db::users::create_active(&state.db, &email, &req.fullname, &hash).await?;
    let role = db::roles::find_by_name(&state.db, authz::ROLE_SUPER_ADMIN)
        .await?
        .ok_or_else(|| {
            AuthError::Internal("super_admin role missing from seed data".to_string())
        })?;
    db::roles::assign_to_user(&state.db, user.id, role.id).await?;

    info!(user_id = user.id, "admin account created");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("Admin account created")),
    ))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    req.validate()?;
    let response =
        crate::http::login::authenticate(&state, authz::SCOPE_DASHBOARD, &req.email, &req.password)
            .await?;
    Ok(Json(response))
}

/// Create an inactive invited account and mail a single-use invite link
/// carrying the role the invitee will receive.
pub async fn invite_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InviteUserRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    req.validate()?;
    let email = normalize_email(&req.email);

    let role = db::roles::find_by_id(&state.db, req.role_id)
        .await?
        .ok_or_else(|| AuthError::Validation("role not found".to_string()))?;

    if db::users::find_by_email(&state.db, &email).await?.is_some() {
        return Err(AuthError::EmailAlreadyExists);
    }

    let user = db::users::create_invited(&state.db, &email).await?;
    let expires_at = Utc::now() + Duration::seconds(state.settings.invite_ttl_secs);
    let invite = db::invites::insert(&state.db, user.id, role.id, expires_at).await?;

    let email_service = state.email.clone();
    let token = invite.token.to_string();
    tokio::spawn(async move {
        email_service.send_invite(&email, &token).await;
    });

    info!(user_id = user.id, role = %role.name, "invite sent");
    Ok((StatusCode::CREATED, Json(MessageResponse::new("Invite sent"))))
}

/// Redeem an invite: set the password, activate the account, grant the
/// invited role, and burn the token.
pub async fn accept_invite(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AcceptInviteRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;

    let token: Uuid = req
        .invite_token
        .parse()
        .map_err(|_| AuthError::InvalidToken)?;
    let invite = db::invites::find_valid(&state.db, token)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let hash = hash_password(&req.password)?;
    db::users::complete_invite(&state.db, invite.user_id, &hash).await?;
    db::roles::assign_to_user(&state.db, invite.user_id, invite.role_id).await?;
    db::invites::mark_used(&state.db, invite.id).await?;

    info!(user_id = invite.user_id, "invite accepted");
    Ok(Json(MessageResponse::new(
        "Invite accepted, you can now log in",
    )))
}
