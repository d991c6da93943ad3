use auth::PasswordError;
use auth::TokenError;
use thiserror::Error;

use crate::domain::mfa::errors::MfaError;
use crate::domain::token::errors::RefreshTokenError;
use crate::user::errors::UserError;

/// Error for login, refresh and logout flows
///
/// Unknown users and wrong passwords share `InvalidCredentials`; unknown,
/// expired and revoked refresh tokens share `RefreshRejected`.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Account is locked")]
    AccountLocked,

    #[error("Account has expired")]
    AccountExpired,

    #[error("Credentials have expired")]
    CredentialsExpired,

    #[error("Refresh token rejected")]
    RefreshRejected,

    #[error("MFA error: {0}")]
    Mfa(#[from] MfaError),

    #[error("Access token error: {0}")]
    Token(#[from] TokenError),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),

    #[error("User error: {0}")]
    User(#[from] UserError),

    #[error("Refresh token error: {0}")]
    Refresh(RefreshTokenError),
}

impl From<RefreshTokenError> for SessionError {
    fn from(err: RefreshTokenError) -> Self {
        match err {
            RefreshTokenError::NotFound | RefreshTokenError::Invalid => {
                SessionError::RefreshRejected
            }
            other => SessionError::Refresh(other),
        }
    }
}
