//! Authentication: password hashing, bearer tokens and the request guard.
//!
//! Passwords are stored as argon2id PHC strings. Signed-in users carry an
//! HS256 JWT whose subject is their user id; the [`require_user`] middleware
//! validates it and makes an [`AuthUser`] available to handlers.

mod middleware;
mod password;
mod token;

pub use middleware::{AuthUser, TOKEN_HEADER, bearer_token, require_user};
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenIssuer};

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request carried no token.
    #[error("authentication token missing")]
    MissingToken,

    /// The token failed validation (bad signature, expired, malformed).
    #[error("invalid authentication token: {0}")]
    InvalidToken(String),

    /// Signing a new token failed.
    #[error("failed to issue token: {0}")]
    Issue(String),

    /// Password hashing or hash parsing failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
}
