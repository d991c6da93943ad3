use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

use crate::domain::token::errors::RefreshTokenError;
use crate::domain::user::models::UserId;

/// Bytes of OS randomness behind every token value.
pub const TOKEN_VALUE_BYTES: usize = 32;

/// Opaque, single-use credential exchanged for a fresh access token.
///
/// Valid while `revoked_at` is unset and the current instant is strictly
/// before `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token_value: String,
    pub user_id: UserId,
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    /// Successor issued by a rotation (unset while rotation does not re-issue)
    pub replaced_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// New token for `user_id` expiring `ttl_seconds` after `now`.
    ///
    /// # Errors
    /// * `OutOfRange` - Expiry is not a representable instant
    pub fn issue(
        user_id: UserId,
        client_id: impl Into<String>,
        ttl_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, RefreshTokenError> {
        let expires_at = Duration::try_seconds(ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| RefreshTokenError::OutOfRange(format!("ttl of {ttl_seconds}s")))?;

        Ok(Self {
            id: Uuid::new_v4(),
            token_value: generate_token_value(),
            user_id,
            client_id: client_id.into(),
            expires_at,
            revoked_at: None,
            replaced_by: None,
            created_at: now,
        })
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// 256 bits from the OS CSPRNG, base64url without padding (43 chars).
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_VALUE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
