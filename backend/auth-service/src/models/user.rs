/// User model and auth request/response types
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_banned: bool,
    pub is_invited: bool,
    pub invited_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A token is honored only for an account that is active, not banned,
    /// and not soft-deleted.
    pub fn can_authenticate(&self) -> bool {
        self.is_active && !self.is_banned && self.deleted_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "fullname is required"))]
    pub fullname: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 1, message = "register_access_token is required"))]
    pub register_access_token: String,
    #[validate(length(equal = 6, message = "otp_code must be 6 digits"))]
    pub otp_code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequestNewOtpRequest {
    #[validate(length(min = 1, message = "register_access_token is required"))]
    pub register_access_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InviteUserRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(range(min = 1, message = "role_id is required"))]
    pub role_id: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptInviteRequest {
    #[validate(length(min = 1, message = "invite_token is required"))]
    pub invite_token: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "old_password is required"))]
    pub old_password: String,
    #[validate(length(min = 8, message = "password must be at least 8 characters"))]
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub register_access_token: String,
    pub expired_otp_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OtpExpiryResponse {
    pub expired_otp_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_uuid: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}
