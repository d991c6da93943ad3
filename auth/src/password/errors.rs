use thiserror::Error;

/// Error type for password hashing.
///
/// A wrong password is not an error; see [`super::CredentialHasher::verify`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Password verification failed: {0}")]
    VerificationFailed(String),
}
