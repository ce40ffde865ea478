//! Application services: email delivery, OTP lifecycle, background jobs.

pub mod cleanup;
pub mod email;
pub mod otp;
