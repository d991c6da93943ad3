use auth::TokenError;
use thiserror::Error;

use crate::user::errors::UserError;

/// Error for refresh token operations
///
/// `NotFound` and `Invalid` are kept apart here for logging; session-level
/// callers report both as one rejection.
#[derive(Debug, Clone, Error)]
pub enum RefreshTokenError {
    #[error("Refresh token not found")]
    NotFound,

    /// Expired, revoked, or lost a concurrent rotation
    #[error("Refresh token is no longer valid")]
    Invalid,

    #[error("Refresh token value collision")]
    DuplicateToken,

    /// Lifetime or retention period outside the representable time range
    #[error("Duration out of range: {0}")]
    OutOfRange(String),

    #[error("Access token error: {0}")]
    Token(#[from] TokenError),

    #[error("User error: {0}")]
    User(#[from] UserError),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
