//! Input normalization helpers shared by the handlers.
//!
//! Structural validation (lengths, formats) lives on the request types via
//! `validator` derives; these helpers cover the bits a derive cannot.

use crate::error::{AuthError, Result};

/// Lowercase and trim an email so lookups and uniqueness checks agree.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// OTP codes are exactly six ASCII digits.
pub fn validate_otp_code(code: &str) -> Result<()> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AuthError::Validation(
            "otp_code must be exactly 6 digits".to_string(),
        ))
    }
}
