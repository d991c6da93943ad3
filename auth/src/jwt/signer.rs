use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::Algorithm;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;

use super::claims::AccessClaims;
use super::errors::TokenError;
use crate::keys::KeyPair;

/// Issuer written into tokens unless configured otherwise.
pub const DEFAULT_ISSUER: &str = "auth-server";

/// Issues and verifies RS256 access tokens.
///
/// Verification only needs the public half of the key pair and performs no
/// storage lookup.
pub struct TokenSigner {
    key_pair: Arc<KeyPair>,
    issuer: String,
    algorithm: Algorithm,
}

impl TokenSigner {
    /// Create a signer over a shared key pair.
    ///
    /// # Arguments
    /// * `key_pair` - RSA key pair from the key provider
    /// * `issuer` - Expected and emitted `iss` claim
    pub fn new(key_pair: Arc<KeyPair>, issuer: impl Into<String>) -> Self {
        Self {
            key_pair,
            issuer: issuer.into(),
            algorithm: Algorithm::RS256,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for `subject` valid for `ttl_seconds` from now.
    pub fn issue(
        &self,
        subject: &str,
        roles: &[String],
        ttl_seconds: i64,
    ) -> Result<String, TokenError> {
        self.issue_at(subject, roles, ttl_seconds, Utc::now())
    }

    /// Issue a token as of `now`.
    ///
    /// RS256 signatures are deterministic, so identical inputs and timestamp
    /// produce an identical token.
    ///
    /// # Errors
    /// * `EncodingFailed` - TTL out of range, or serialization or signing failed
    pub fn issue_at(
        &self,
        subject: &str,
        roles: &[String],
        ttl_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = AccessClaims::new(
            subject,
            roles.iter().cloned(),
            self.issuer.as_str(),
            now,
            ttl_seconds,
        )?;
        self.encode(&claims)
    }

    /// Sign arbitrary access claims.
    pub fn encode(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        let header = Header::new(self.algorithm);

        encode(&header, claims, self.key_pair.encoding_key())
            .map_err(|e| TokenError::EncodingFailed(e.to_string()))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify signature, issuer and structure, then expiry as of `now`.
    ///
    /// Expiry is checked without leeway: a token is expired once
    /// `exp < now`.
    ///
    /// # Errors
    /// * `SignatureInvalid` - Malformed, tampered, signed by another key, wrong issuer or missing claims
    /// * `Expired` - Signature is valid but the token has expired
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[self.issuer.as_str()]);

        let token_data = decode::<AccessClaims>(token, self.key_pair.decoding_key(), &validation)
            .map_err(|e| TokenError::SignatureInvalid(e.to_string()))?;

        if token_data.claims.is_expired(now.timestamp()) {
            return Err(TokenError::Expired);
        }

        Ok(token_data.claims)
    }

    /// Subject of a verified token.
    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token).map(|claims| claims.sub)
    }

    /// Expiry of a verified token.
    pub fn extract_expiry(&self, token: &str) -> Result<DateTime<Utc>, TokenError> {
        let claims = self.verify(token)?;
        claims
            .expires_at()
            .ok_or_else(|| TokenError::SignatureInvalid("exp out of range".to_string()))
    }
}
