/// Data models for the auth service
pub mod otp;
pub mod role;
pub mod session;
pub mod user;

pub use otp::{OtpCacheRecord, StoredOtp};
pub use role::Role;
pub use session::ActiveSession;
pub use user::User;
