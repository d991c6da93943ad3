use auth::TotpError;
use thiserror::Error;

use crate::user::errors::UserError;

/// Error for multi-factor enrollment and verification
///
/// A wrong code is not an error; `verify` returns `Ok(false)`.
#[derive(Debug, Clone, Error)]
pub enum MfaError {
    #[error("MFA is not enabled for this account")]
    MfaNotEnabled,

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("TOTP error: {0}")]
    Totp(#[from] TotpError),

    #[error("User error: {0}")]
    User(#[from] UserError),
}
