use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account inactive, banned, or deleted")]
    AccountDisabled,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Wrong token type for this endpoint")]
    WrongTokenType,

    #[error("Session superseded by a newer login")]
    SessionSuperseded,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Forbidden")]
    Forbidden,

    #[error("OTP mismatch")]
    OtpMismatch,

    #[error("OTP not found or expired")]
    OtpNotFound,

    #[error("Too many OTP attempts")]
    OtpTooManyAttempts,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status and caller-visible message.
    ///
    /// Every authentication failure collapses into a single generic
    /// "Unauthorized" so callers cannot distinguish a wrong password from a
    /// revoked token or a banned account (no account enumeration).
    /// Authorization failures are distinct (403), validation failures keep
    /// their specific message, infrastructure details never leave the logs.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthError::InvalidCredentials
            | AuthError::AccountDisabled
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::WrongTokenType
            | AuthError::SessionSuperseded
            | AuthError::OtpMismatch
            | AuthError::OtpNotFound => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),

            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),

            AuthError::OtpTooManyAttempts | AuthError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),

            AuthError::EmailAlreadyExists => (
                StatusCode::CONFLICT,
                "Email already registered".to_string(),
            ),

            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),

            AuthError::Database(_) | AuthError::Redis(_) | AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

// Conversions from external error types

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        AuthError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("Redis error: {}", err);
        AuthError::Redis(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        }
    }
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(err: validator::ValidationErrors) -> Self {
        AuthError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failures_share_one_message() {
        let variants = [
            AuthError::InvalidCredentials,
            AuthError::AccountDisabled,
            AuthError::InvalidToken,
            AuthError::TokenExpired,
            AuthError::TokenRevoked,
            AuthError::WrongTokenType,
            AuthError::SessionSuperseded,
            AuthError::OtpMismatch,
            AuthError::OtpNotFound,
        ];

        for variant in variants {
            let (status, message) = variant.status_and_message();
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "Unauthorized");
        }
    }

    #[test]
    fn authorization_failure_is_distinct_from_authentication() {
        let (status, _) = AuthError::Forbidden.status_and_message();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn otp_exhaustion_maps_to_too_many_requests() {
        let (status, _) = AuthError::OtpTooManyAttempts.status_and_message();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn infrastructure_errors_never_leak_details() {
        let (status, message) =
            AuthError::Database("connection refused to 10.0.0.5".into()).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("10.0.0.5"));
    }

    #[test]
    fn expired_jwt_maps_to_token_expired() {
        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );
        assert!(matches!(AuthError::from(err), AuthError::TokenExpired));
    }
}
