/// Shopedia Auth Service Library
///
/// Authentication and session-integrity subsystem for the Shopedia backend:
/// registration with OTP verification, single-active-session JWT login,
/// token revocation, and the role/permission/scope authorization chain.
///
/// ## Modules
///
/// - `authz`: role/permission/scope matching rules
/// - `config`: service configuration
/// - `db`: database repositories (users, roles, otp, sessions, revocation)
/// - `error`: error types and HTTP mapping
/// - `http`: router, handlers, and the authentication middleware chain
/// - `models`: data models and request/response types
/// - `security`: token issuing/parsing and password hashing
/// - `services`: OTP delivery, email transport, background maintenance
/// - `validators`: input validation helpers
pub mod authz;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod security;
pub mod services;
pub mod validators;

// Re-export commonly used types
pub use error::{AuthError, Result};

use redis_utils::SharedConnectionManager;

/// Shared application state, constructed once at startup and injected into
/// every handler and middleware. Nothing in the service reaches for a
/// process-wide singleton; all client handles live here.
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub redis: Option<SharedConnectionManager>,
    pub tokens: security::tokens::TokenIssuer,
    pub otp: services::otp::OtpService,
    pub email: services::email::EmailService,
    pub settings: config::Settings,
}
