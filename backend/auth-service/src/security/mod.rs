/// Security primitives for the auth service
///
/// - **password**: Argon2id password hashing and verification
/// - **tokens**: signed, typed, expiring JWT issue/parse with unique JTIs
pub mod password;
pub mod tokens;

pub use password::{hash_password, verify_password};
pub use tokens::{Claims, IssuedToken, TokenIssuer, TokenType};
