use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::token::errors::RefreshTokenError;
use crate::domain::token::models::RefreshToken;
use crate::domain::user::models::UserId;

/// Durable storage for refresh token records.
///
/// Implementations enforce uniqueness of `token_value` and perform every
/// conditional revoke as a single atomic step.
#[async_trait]
pub trait TokenRecordStore: Send + Sync + 'static {
    /// Persist a new token.
    ///
    /// # Errors
    /// * `DuplicateToken` - A record with the same value already exists
    /// * `DatabaseError` - Database operation failed
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, RefreshTokenError>;

    /// Retrieve a token by its opaque value.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, RefreshTokenError>;

    /// Revoke the token only if it is still valid at `now`.
    ///
    /// # Returns
    /// `true` for exactly one caller per token; `false` if it was already
    /// revoked, expired or missing
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn revoke_if_valid(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RefreshTokenError>;

    /// Revoke the token unless it is already revoked.
    ///
    /// # Returns
    /// `true` if this call set `revoked_at`
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn revoke(&self, value: &str, now: DateTime<Utc>) -> Result<bool, RefreshTokenError>;

    /// Revoke every token of the user that is valid at `now`.
    ///
    /// # Returns
    /// Number of tokens revoked
    async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, RefreshTokenError>;

    /// Revoke every token of the user issued to `client_id` that is valid at `now`.
    ///
    /// # Returns
    /// Number of tokens revoked
    async fn revoke_all_for_user_and_client(
        &self,
        user_id: &UserId,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, RefreshTokenError>;

    /// Tokens of the user valid at `now`, newest first.
    async fn find_valid_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, RefreshTokenError>;

    /// Permanently delete tokens that expired before `cutoff`.
    ///
    /// # Returns
    /// Number of records deleted
    async fn delete_expired_before(&self, cutoff: DateTime<Utc>)
        -> Result<u64, RefreshTokenError>;
}
