/// Customer-facing auth handlers (`/api/app`).
use crate::db;
use crate::error::{AuthError, Result};
use crate::http::auth::AuthContext;
use crate::http::login;
use crate::models::user::{
    LoginRequest, LoginResponse, MeResponse, MessageResponse, OtpExpiryResponse,
    RegisterRequest, RegisterResponse, RequestNewOtpRequest, VerifyOtpRequest,
};
use crate::models::User;
use crate::security::password::hash_password;
use crate::security::tokens::{Claims, TokenType};
use crate::validators::{normalize_email, validate_otp_code};
use crate::{authz, AppState};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Start registration. The account is created inactive; the caller gets a
/// registration token to present alongside the emailed OTP.
///
/// Re-registering an unverified address resumes the pending registration
/// (same outstanding OTP, fresh token) instead of duplicating the account.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    req.validate()?;
    let email = normalize_email(&req.email);

    let user = match db::users::find_by_email(&state.db, &email).await? {
        Some(existing) if existing.is_active => return Err(AuthError::EmailAlreadyExists),
        Some(pending) => pending,
        None => {
            let hash = hash_password(&req.password)?;
            let user = db::users::create_inactive(&state.db, &email, &req.fullname, &hash).await?;
            let role = db::roles::find_by_name(&state.db, authz::ROLE_END_USER)
                .await?
                .ok_or_else(|| {
                    AuthError::Internal("end_user role missing from seed data".to_string())
                })?;
            db::roles::assign_to_user(&state.db, user.id, role.id).await?;
            info!(user_id = user.id, "registration started");
            user
        }
    };

    let expired_otp_at = state.otp.issue(user.id, &email).await?;
    let issued = state.tokens.issue_registration(user.id, user.uuid)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            register_access_token: issued.token,
            expired_otp_at,
        }),
    ))
}

/// Resolve a registration token to its pending user. The revocation check
/// fails closed, same as the access-token path.
async fn registration_user(state: &AppState, token: &str) -> Result<(Claims, User)> {
    let claims = state.tokens.parse(token)?;
    if claims.token_type != TokenType::Register {
        return Err(AuthError::WrongTokenType);
    }
    if db::token_revocation::is_revoked(&state.db, &claims.jti)
        .await
        .unwrap_or(true)
    {
        return Err(AuthError::TokenRevoked);
    }
    let user = db::users::find_by_id(&state.db, claims.user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    Ok((claims, user))
}

/// Complete registration by matching the emailed OTP. Success activates the
/// account and retires both the code and the registration token.
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<MessageResponse>> {
    req.validate()?;
    validate_otp_code(&req.otp_code)?;

    let (claims, user) = registration_user(&state, &req.register_access_token).await?;
    if user.is_active {
        return Ok(Json(MessageResponse::new("Account already verified")));
    }

    state.otp.verify(user.id, &user.email, &req.otp_code).await?;
    db::users::activate(&state.db, user.id).await?;

    // The registration token is single-use.
    db::token_revocation::revoke(&state.db, &claims.jti, user.id, claims.expires_at()).await?;

    info!(user_id = user.id, "account verified");
    Ok(Json(MessageResponse::new("Account verified, you can now log in")))
}

/// Resend (or re-announce) the OTP for a pending registration.
pub async fn request_new_otp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RequestNewOtpRequest>,
) -> Result<Json<OtpExpiryResponse>> {
    req.validate()?;

    let (_claims, user) = registration_user(&state, &req.register_access_token).await?;
    if user.is_active {
        return Err(AuthError::Validation("account already verified".to_string()));
    }

    let expired_otp_at = state.otp.issue(user.id, &user.email).await?;
    Ok(Json(OtpExpiryResponse { expired_otp_at }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    req.validate()?;
    let response = login::authenticate(&state, authz::SCOPE_APP, &req.email, &req.password).await?;
    Ok(Json(response))
}

/// Revoke the presented token and drop the active session. Shared by both
/// surfaces; the guard chain in front differs, the semantics do not.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<MessageResponse>> {
    db::token_revocation::revoke(&state.db, &ctx.jti, ctx.user_id, ctx.token_expires_at).await?;
    db::sessions::clear(&state.db, ctx.user_id).await?;
    info!(user_id = ctx.user_id, "logged out");
    Ok(Json(MessageResponse::new("Logged out")))
}

pub async fn me(Extension(ctx): Extension<AuthContext>) -> Json<MeResponse> {
    Json(MeResponse {
        user_uuid: ctx.user_uuid,
        email: ctx.email,
        roles: ctx.roles,
    })
}
