use thiserror::Error;

/// Error type for one-time password operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TotpError {
    #[error("Invalid TOTP secret: {0}")]
    InvalidSecret(String),

    #[error("Unsupported digit count: {0} (expected 6 to 8)")]
    InvalidDigits(u32),

    #[error("TOTP period must be greater than zero")]
    ZeroPeriod,
}
