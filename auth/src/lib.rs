//! Cryptographic building blocks for the authentication service.
//!
//! - RSA signing keys loaded from PEM files, with an ephemeral fallback
//! - RS256 access token issuance and verification
//! - RFC 6238 time-based one-time passwords
//! - Password hashing (Argon2id)
//!
//! Nothing here touches storage; services compose these pieces behind their
//! own ports.
//!
//! # Examples
//!
//! ## Access Tokens
//! ```no_run
//! use std::sync::Arc;
//!
//! use auth::{KeyPair, TokenSigner};
//!
//! let key_pair = Arc::new(KeyPair::generate().unwrap());
//! let signer = TokenSigner::new(key_pair, auth::DEFAULT_ISSUER);
//!
//! let token = signer.issue("alice", &["ROLE_USER".to_string()], 3600).unwrap();
//! let claims = signer.verify(&token).unwrap();
//! assert_eq!(claims.sub, "alice");
//! ```
//!
//! ## One-Time Passwords
//! ```
//! use auth::{TotpConfig, TotpGenerator, TotpSecret};
//!
//! let generator = TotpGenerator::new(TotpConfig::new("Auth Server")).unwrap();
//! let secret = TotpSecret::generate();
//!
//! let code = generator.generate_at(&secret, 1_700_000_000).unwrap();
//! assert!(generator.verify_at(&secret, &code, 1_700_000_000).unwrap());
//! println!("{}", generator.provisioning_uri("alice", &secret));
//! ```
//!
//! ## Password Hashing
//! ```
//! use auth::{Argon2Hasher, CredentialHasher};
//!
//! let hasher = Argon2Hasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash).unwrap());
//! ```

pub mod jwt;
pub mod keys;
pub mod password;
pub mod totp;

// Re-export commonly used items
pub use jwt::AccessClaims;
pub use jwt::TokenError;
pub use jwt::TokenSigner;
pub use jwt::DEFAULT_ISSUER;
pub use keys::KeyError;
pub use keys::KeyPair;
pub use keys::KeyProvider;
pub use password::Argon2Hasher;
pub use password::CredentialHasher;
pub use password::PasswordError;
pub use totp::TotpAlgorithm;
pub use totp::TotpConfig;
pub use totp::TotpError;
pub use totp::TotpGenerator;
pub use totp::TotpSecret;
