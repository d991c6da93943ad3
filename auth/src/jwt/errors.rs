use thiserror::Error;

/// Error type for access token operations.
///
/// `Expired` is only produced once the signature has been verified, so it
/// never hides a forged or malformed token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Token signature is invalid: {0}")]
    SignatureInvalid(String),

    #[error("Token is expired")]
    Expired,
}
