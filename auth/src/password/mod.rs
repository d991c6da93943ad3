pub mod argon2;
pub mod errors;

pub use argon2::Argon2Hasher;
pub use errors::PasswordError;

/// One-way password hashing capability.
///
/// Callers treat hashes as opaque strings; only the implementation knows
/// their format.
pub trait CredentialHasher: Send + Sync + 'static {
    /// Hash a plaintext password for storage.
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// Check a plaintext password against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch; errors are reserved for unusable
    /// hashes.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError>;
}
