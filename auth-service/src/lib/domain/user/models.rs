use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::user::errors::EmailError;
use crate::user::errors::UserIdError;
use crate::user::errors::UsernameError;

/// User record as seen by the authentication core.
///
/// Account management lives elsewhere; this service reads credentials,
/// status flags and roles, and writes only MFA enrollment and last login.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: EmailAddress,
    pub password_hash: String,
    pub enabled: bool,
    pub account_locked: bool,
    pub account_expired: bool,
    pub credentials_expired: bool,
    pub roles: BTreeSet<String>,
    pub mfa: MfaProfile,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create an enabled account with no roles and MFA disabled.
    ///
    /// # Arguments
    /// * `username` - Validated username
    /// * `email` - Validated email address
    /// * `password_hash` - Opaque hash produced by a credential hasher
    pub fn new(username: Username, email: EmailAddress, password_hash: String) -> Self {
        Self {
            id: UserId::new(),
            username,
            email,
            password_hash,
            enabled: true,
            account_locked: false,
            account_expired: false,
            credentials_expired: false,
            roles: BTreeSet::new(),
            mfa: MfaProfile::disabled(),
            created_at: Utc::now(),
            last_login_at: None,
        }
    }

    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the account may still obtain tokens.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.account_locked && !self.account_expired && !self.credentials_expired
    }

    /// Role names in sorted order.
    pub fn role_names(&self) -> Vec<String> {
        self.roles.iter().cloned().collect()
    }
}

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    ///
    /// # Returns
    /// UserId with random UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Username value type
///
/// 3-32 characters of alphanumerics, underscore and hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Username(String);

impl Username {
    const MIN_LENGTH: usize = 3;
    const MAX_LENGTH: usize = 32;

    /// Create a new valid username.
    ///
    /// # Errors
    /// * `TooShort` - Username shorter than 3 characters
    /// * `TooLong` - Username longer than 32 characters
    /// * `InvalidCharacters` - Contains non-alphanumeric characters (except _ and -)
    pub fn new(username: impl Into<String>) -> Result<Self, UsernameError> {
        let username = username.into();
        let length = username.chars().count();
        if length < Self::MIN_LENGTH {
            return Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            });
        }
        if length > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            });
        }
        if !username
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        {
            return Err(UsernameError::InvalidCharacters);
        }
        Ok(Self(username))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validates email format using RFC 5322 compliant parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: impl Into<String>) -> Result<Self, EmailError> {
        let email = email.into();
        email_address::EmailAddress::from_str(&email)
            .map(|_| EmailAddress(email))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Second-factor enrollment attached to a user.
///
/// A disabled profile never carries a secret or backup codes; the
/// constructors are the only way to build one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MfaProfile {
    secret: Option<String>,
    enabled: bool,
    backup_codes: BTreeSet<String>,
}

impl MfaProfile {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Active enrollment with a base32 secret and a full set of backup codes.
    pub fn enrolled(secret: String, backup_codes: BTreeSet<String>) -> Self {
        Self {
            secret: Some(secret),
            enabled: true,
            backup_codes,
        }
    }

    /// Rebuild a profile from stored columns.
    ///
    /// Inconsistent rows (enabled without a secret, or disabled with leftover
    /// material) collapse to the disabled profile.
    pub fn from_parts<I>(enabled: bool, secret: Option<String>, backup_codes: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        match (enabled, secret) {
            (true, Some(secret)) if !secret.is_empty() => {
                Self::enrolled(secret, backup_codes.into_iter().collect())
            }
            _ => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref()
    }

    pub fn backup_codes(&self) -> &BTreeSet<String> {
        &self.backup_codes
    }

    pub fn has_backup_code(&self, code: &str) -> bool {
        self.backup_codes.contains(code)
    }

    /// Remove one backup code; returns whether it was present.
    pub fn remove_backup_code(&mut self, code: &str) -> bool {
        self.backup_codes.remove(code)
    }

    /// Replace the backup code set. No effect on a disabled profile.
    pub fn replace_backup_codes(&mut self, backup_codes: BTreeSet<String>) {
        if self.enabled {
            self.backup_codes = backup_codes;
        }
    }
}
