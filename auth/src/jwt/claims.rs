use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::errors::TokenError;

/// Claims carried by every access token.
///
/// Roles are kept sorted and deduplicated so identical inputs always
/// serialize to identical tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Subject (username)
    pub sub: String,

    /// Role names granted at issuance
    #[serde(default)]
    pub roles: Vec<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issuer
    pub iss: String,
}

impl AccessClaims {
    /// Create claims for a subject valid for `ttl_seconds` from `issued_at`.
    ///
    /// # Arguments
    /// * `subject` - Username the token asserts
    /// * `roles` - Role names (order and duplicates are normalized)
    /// * `issuer` - Value of the `iss` claim
    /// * `issued_at` - Issuance instant (sub-second precision is dropped)
    /// * `ttl_seconds` - Lifetime in seconds
    ///
    /// # Errors
    /// * `EncodingFailed` - Expiry falls outside the representable time range
    pub fn new<I, R>(
        subject: impl Into<String>,
        roles: I,
        issuer: impl Into<String>,
        issued_at: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> Result<Self, TokenError>
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let expires_at = Duration::try_seconds(ttl_seconds)
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or_else(|| {
                TokenError::EncodingFailed(format!("ttl of {ttl_seconds}s is out of range"))
            })?;

        let mut roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        roles.sort();
        roles.dedup();

        Ok(Self {
            sub: subject.into(),
            roles,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: issuer.into(),
        })
    }

    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Issuance instant, `None` if the timestamp is out of range.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    /// Expiry instant, `None` if the timestamp is out of range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Check if token is expired.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp < current_timestamp
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_new_sets_expiration_from_ttl() {
        let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let claims = AccessClaims::new("alice", ["ROLE_USER"], "auth-server", issued_at, 3600).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert_eq!(claims.iss, "auth-server");
        assert_eq!(claims.expires_at(), Some(issued_at + Duration::seconds(3600)));
    }

    #[test]
    fn test_roles_are_sorted_and_deduplicated() {
        let claims = AccessClaims::new(
            "alice",
            ["ROLE_USER", "ROLE_ADMIN", "ROLE_USER"],
            "auth-server",
            Utc::now(),
            60,
        )
        .unwrap();

        assert_eq!(claims.roles, vec!["ROLE_ADMIN", "ROLE_USER"]);
        assert!(claims.has_role("ROLE_ADMIN"));
        assert!(!claims.has_role("ROLE_AUDITOR"));
    }

    #[test]
    fn test_is_expired() {
        let issued_at = Utc.timestamp_opt(1000, 0).unwrap();
        let claims = AccessClaims::new("alice", Vec::<String>::new(), "iss", issued_at, 0).unwrap();

        assert!(!claims.is_expired(999)); // Not expired
        assert!(!claims.is_expired(1000)); // Exactly at expiration
        assert!(claims.is_expired(1001)); // Expired
    }

    #[test]
    fn test_out_of_range_ttl_is_an_error() {
        let issued_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();

        for ttl in [i64::MAX, i64::MAX / 1000 + 1, i64::MIN] {
            assert!(matches!(
                AccessClaims::new("alice", ["ROLE_USER"], "iss", issued_at, ttl),
                Err(TokenError::EncodingFailed(_))
            ));
        }
    }
}
