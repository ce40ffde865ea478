//! Database repositories.
//!
//! Plain async functions over a `PgPool`, one module per aggregate. All
//! user-facing lookups exclude soft-deleted rows; hard deletes only happen
//! in the revocation cleanup job.

pub mod invites;
pub mod otp;
pub mod password_reset;
pub mod roles;
pub mod sessions;
pub mod token_revocation;
pub mod users;
