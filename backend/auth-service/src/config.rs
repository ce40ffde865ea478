//! Configuration management for the auth service
//!
//! Settings are read from environment variables (optionally via a `.env`
//! file loaded in `main`). The token signing secret and the database URL are
//! required; everything else has a development-friendly default. The Redis
//! endpoint is optional; without it OTP verification falls back to the
//! durable store and rate limiting is disabled.

use anyhow::{bail, Result};
use std::env;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub jwt: JwtSettings,
    pub redis_url: Option<String>,
    pub otp: OtpSettings,
    pub email: EmailSettings,
    pub invite_ttl_secs: i64,
    pub password_reset_ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    /// HS256 signing secret, shared by issue and verify paths.
    pub secret: String,
    pub access_ttl_secs: i64,
    pub registration_ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct EmailSettings {
    /// Empty host puts the email service into no-op (log only) mode.
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
    pub frontend_base_url: String,
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// Fails fast when `JWT_SECRET` or `DATABASE_URL` is absent: the
    /// service must never start with an unsigned token path, and an
    /// unreachable store is discovered at pool creation either way.
    pub fn from_env() -> Result<Self> {
        let secret = match env::var("JWT_SECRET") {
            Ok(s) if !s.trim().is_empty() => s,
            _ => bail!("JWT_SECRET is required but not set"),
        };

        if env::var("DATABASE_URL").is_err() {
            bail!("DATABASE_URL is required but not set");
        }

        Ok(Self {
            server: ServerSettings {
                host: env_or("SERVER_HOST", "0.0.0.0"),
                port: env_parse("SERVER_PORT", 3000),
            },
            jwt: JwtSettings {
                secret,
                access_ttl_secs: env_parse("JWT_ACCESS_TTL_SECS", 24 * 3600),
                registration_ttl_secs: env_parse("JWT_REGISTRATION_TTL_SECS", 15 * 60),
            },
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            otp: OtpSettings {
                ttl_secs: env_parse("OTP_TTL_SECS", 5 * 60),
            },
            email: EmailSettings {
                smtp_host: env_or("SMTP_HOST", ""),
                smtp_port: env_parse("SMTP_PORT", 587),
                smtp_username: env::var("SMTP_USER").ok(),
                smtp_password: env::var("SMTP_PASS").ok(),
                smtp_from: env_or("SMTP_FROM", "Shopedia <noreply@shopedia.dev>"),
                frontend_base_url: env_or("FRONTEND_URL", "https://shopedia.dev"),
            },
            invite_ttl_secs: env_parse("INVITE_TTL_SECS", 24 * 3600),
            password_reset_ttl_secs: env_parse("PASSWORD_RESET_TTL_SECS", 15 * 60),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
