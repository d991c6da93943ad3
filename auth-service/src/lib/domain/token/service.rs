use std::sync::Arc;

use auth::TokenSigner;
use chrono::Duration;

use crate::domain::clock::Clock;
use crate::domain::token::errors::RefreshTokenError;
use crate::domain::token::models::RefreshToken;
use crate::domain::token::ports::TokenRecordStore;
use crate::domain::user::models::User;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserDirectory;

/// Refresh token lifecycle: issue, rotate, revoke and clean up.
///
/// Rotation is single-use and does not hand out a successor refresh token.
pub struct RefreshTokenStore<TS, UD>
where
    TS: TokenRecordStore,
    UD: UserDirectory,
{
    records: Arc<TS>,
    users: Arc<UD>,
    signer: Arc<TokenSigner>,
    clock: Arc<dyn Clock>,
    access_token_ttl_secs: i64,
}

impl<TS, UD> RefreshTokenStore<TS, UD>
where
    TS: TokenRecordStore,
    UD: UserDirectory,
{
    /// # Arguments
    /// * `records` - Refresh token persistence
    /// * `users` - Directory used to re-read roles on rotation
    /// * `signer` - Access token signer
    /// * `clock` - Time source for lifetimes
    /// * `access_token_ttl_secs` - Lifetime of access tokens minted by rotation
    pub fn new(
        records: Arc<TS>,
        users: Arc<UD>,
        signer: Arc<TokenSigner>,
        clock: Arc<dyn Clock>,
        access_token_ttl_secs: i64,
    ) -> Self {
        Self {
            records,
            users,
            signer,
            clock,
            access_token_ttl_secs,
        }
    }

    pub fn access_token_ttl_secs(&self) -> i64 {
        self.access_token_ttl_secs
    }

    /// Issue and persist a refresh token for `user`.
    ///
    /// # Errors
    /// * `OutOfRange` - `ttl_seconds` puts the expiry outside the representable time range
    /// * `DuplicateToken` - Generated value collided with a stored one
    /// * `DatabaseError` - Database operation failed
    pub async fn create(
        &self,
        user: &User,
        client_id: &str,
        ttl_seconds: i64,
    ) -> Result<RefreshToken, RefreshTokenError> {
        let token = RefreshToken::issue(user.id, client_id, ttl_seconds, self.clock.now())?;
        let token = self.records.insert(token).await?;

        tracing::debug!(
            user_id = %user.id,
            client_id = %client_id,
            expires_at = %token.expires_at,
            "Issued refresh token"
        );

        Ok(token)
    }

    /// Exchange a refresh token for a new access token, consuming it.
    ///
    /// Roles are read from the directory at rotation time.
    ///
    /// # Returns
    /// Signed access token
    ///
    /// # Errors
    /// * `NotFound` - No token with this value
    /// * `Invalid` - Expired, revoked, already rotated, or the owning account is gone or inactive
    /// * `Token` - Access token signing failed
    pub async fn rotate(&self, token_value: &str) -> Result<String, RefreshTokenError> {
        let now = self.clock.now();

        let token = self
            .records
            .find_by_value(token_value)
            .await?
            .ok_or(RefreshTokenError::NotFound)?;

        if !token.is_valid(now) {
            tracing::debug!(token_id = %token.id, "Rejected rotation of invalid refresh token");
            return Err(RefreshTokenError::Invalid);
        }

        let user = match self.users.find_by_id(&token.user_id).await? {
            Some(user) if user.is_active() => user,
            _ => {
                tracing::warn!(
                    token_id = %token.id,
                    user_id = %token.user_id,
                    "Rejected rotation for missing or inactive account"
                );
                return Err(RefreshTokenError::Invalid);
            }
        };

        if !self.records.revoke_if_valid(token_value, now).await? {
            tracing::warn!(token_id = %token.id, "Refresh token consumed concurrently");
            return Err(RefreshTokenError::Invalid);
        }

        let access_token = self.signer.issue_at(
            user.username.as_str(),
            &user.role_names(),
            self.access_token_ttl_secs,
            now,
        )?;

        tracing::info!(
            token_id = %token.id,
            user_id = %user.id,
            client_id = %token.client_id,
            "Rotated refresh token"
        );

        Ok(access_token)
    }

    /// Revoke one token. Unknown or already revoked values are a no-op.
    pub async fn revoke(&self, token_value: &str) -> Result<(), RefreshTokenError> {
        let revoked = self.records.revoke(token_value, self.clock.now()).await?;
        tracing::debug!(revoked, "Revoke refresh token");
        Ok(())
    }

    /// Revoke every valid token of `username`.
    ///
    /// # Returns
    /// Number of tokens revoked (0 for an unknown user)
    pub async fn revoke_all_for_user(&self, username: &Username) -> Result<u64, RefreshTokenError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            return Ok(0);
        };

        let count = self
            .records
            .revoke_all_for_user(&user.id, self.clock.now())
            .await?;

        tracing::info!(user_id = %user.id, count, "Revoked all refresh tokens for user");
        Ok(count)
    }

    /// Revoke the valid tokens `username` holds for one client.
    ///
    /// # Returns
    /// Number of tokens revoked (0 for an unknown user)
    pub async fn revoke_all_for_user_and_client(
        &self,
        username: &Username,
        client_id: &str,
    ) -> Result<u64, RefreshTokenError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            return Ok(0);
        };

        let count = self
            .records
            .revoke_all_for_user_and_client(&user.id, client_id, self.clock.now())
            .await?;

        tracing::info!(
            user_id = %user.id,
            client_id = %client_id,
            count,
            "Revoked client refresh tokens for user"
        );
        Ok(count)
    }

    /// Delete tokens that expired more than `retention_days` ago.
    ///
    /// Maintenance only; request paths never call this.
    ///
    /// # Errors
    /// * `OutOfRange` - Negative retention, or a cutoff before the earliest representable instant
    pub async fn cleanup_expired(&self, retention_days: i64) -> Result<u64, RefreshTokenError> {
        let cutoff = Some(retention_days)
            .filter(|days| *days >= 0)
            .and_then(Duration::try_days)
            .and_then(|retention| self.clock.now().checked_sub_signed(retention))
            .ok_or_else(|| {
                RefreshTokenError::OutOfRange(format!("retention of {retention_days} days"))
            })?;
        let deleted = self.records.delete_expired_before(cutoff).await?;

        tracing::info!(deleted, cutoff = %cutoff, "Deleted expired refresh tokens");
        Ok(deleted)
    }

    pub async fn find_by_value(
        &self,
        token_value: &str,
    ) -> Result<Option<RefreshToken>, RefreshTokenError> {
        self.records.find_by_value(token_value).await
    }

    /// Whether `token_value` names a token that is valid now.
    pub async fn is_token_valid(&self, token_value: &str) -> Result<bool, RefreshTokenError> {
        let now = self.clock.now();
        Ok(self
            .records
            .find_by_value(token_value)
            .await?
            .is_some_and(|token| token.is_valid(now)))
    }

    /// Tokens of `username` that are valid now (empty for an unknown user).
    pub async fn valid_tokens_for_user(
        &self,
        username: &Username,
    ) -> Result<Vec<RefreshToken>, RefreshTokenError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            return Ok(Vec::new());
        };

        self.records
            .find_valid_for_user(&user.id, self.clock.now())
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use auth::KeyPair;
    use chrono::DateTime;
    use chrono::Utc;
    use mockall::mock;
    use mockall::predicate::*;
    use once_cell::sync::Lazy;

    use super::*;
    use crate::domain::clock::ManualClock;
    use crate::domain::user::models::EmailAddress;
    use crate::domain::user::models::MfaProfile;
    use crate::domain::user::models::UserId;
    use crate::user::errors::UserError;

    static KEY_PAIR: Lazy<Arc<KeyPair>> =
        Lazy::new(|| Arc::new(KeyPair::generate().expect("Failed to generate key pair")));

    pub(crate) const NOW: i64 = 1_700_000_000;

    pub(crate) fn signer() -> Arc<TokenSigner> {
        Arc::new(TokenSigner::new(KEY_PAIR.clone(), auth::DEFAULT_ISSUER))
    }

    pub(crate) fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    pub(crate) fn alice() -> User {
        User::new(
            Username::new("alice").unwrap(),
            EmailAddress::new("alice@example.com").unwrap(),
            "hash".to_string(),
        )
        .with_roles(["ROLE_USER"])
    }

    mock! {
        pub TestTokenRecordStore {}

        #[async_trait]
        impl TokenRecordStore for TestTokenRecordStore {
            async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, RefreshTokenError>;
            async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, RefreshTokenError>;
            async fn revoke_if_valid(&self, value: &str, now: DateTime<Utc>) -> Result<bool, RefreshTokenError>;
            async fn revoke(&self, value: &str, now: DateTime<Utc>) -> Result<bool, RefreshTokenError>;
            async fn revoke_all_for_user(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<u64, RefreshTokenError>;
            async fn revoke_all_for_user_and_client(&self, user_id: &UserId, client_id: &str, now: DateTime<Utc>) -> Result<u64, RefreshTokenError>;
            async fn find_valid_for_user(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Vec<RefreshToken>, RefreshTokenError>;
            async fn delete_expired_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RefreshTokenError>;
        }
    }

    mock! {
        pub TestUserDirectory {}

        #[async_trait]
        impl UserDirectory for TestUserDirectory {
            async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError>;
            async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;
            async fn save(&self, user: User) -> Result<User, UserError>;
            async fn consume_backup_code(&self, id: &UserId, code: &str) -> Result<bool, UserError>;
            async fn update_last_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), UserError>;
            async fn set_mfa_profile(&self, id: &UserId, profile: &MfaProfile) -> Result<bool, UserError>;
            async fn replace_backup_codes(&self, id: &UserId, backup_codes: &BTreeSet<String>) -> Result<bool, UserError>;
        }
    }

    fn store(
        records: MockTestTokenRecordStore,
        users: MockTestUserDirectory,
    ) -> RefreshTokenStore<MockTestTokenRecordStore, MockTestUserDirectory> {
        RefreshTokenStore::new(
            Arc::new(records),
            Arc::new(users),
            signer(),
            Arc::new(ManualClock::at_timestamp(NOW)),
            3600,
        )
    }

    #[tokio::test]
    async fn test_create_persists_token_with_ttl() {
        let user = alice();
        let user_id = user.id;
        let mut records = MockTestTokenRecordStore::new();

        records
            .expect_insert()
            .withf(move |token| {
                token.user_id == user_id
                    && token.client_id == "web"
                    && token.expires_at == at(NOW + 86400)
                    && token.revoked_at.is_none()
            })
            .times(1)
            .returning(|token| Ok(token));

        let service = store(records, MockTestUserDirectory::new());

        let token = service.create(&user, "web", 86400).await.unwrap();
        assert_eq!(token.token_value.len(), 43);
    }

    #[tokio::test]
    async fn test_create_surfaces_duplicate() {
        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_insert()
            .times(1)
            .returning(|_| Err(RefreshTokenError::DuplicateToken));

        let service = store(records, MockTestUserDirectory::new());

        let result = service.create(&alice(), "web", 60).await;
        assert!(matches!(result, Err(RefreshTokenError::DuplicateToken)));
    }

    #[tokio::test]
    async fn test_rotate_issues_access_token_with_current_roles() {
        let user = alice().with_roles(["ROLE_USER", "ROLE_ADMIN"]);
        let token = RefreshToken::issue(user.id, "web", 60, at(NOW - 10)).unwrap();
        let value = token.token_value.clone();

        let mut records = MockTestTokenRecordStore::new();
        let stored = token.clone();
        let expected = value.clone();
        records
            .expect_find_by_value()
            .withf(move |v| v == expected)
            .times(1)
            .returning(move |_| Ok(Some(stored.clone())));
        records
            .expect_revoke_if_valid()
            .withf(|_, now| *now == at(NOW))
            .times(1)
            .returning(|_, _| Ok(true));

        let mut users = MockTestUserDirectory::new();
        let found = user.clone();
        users
            .expect_find_by_id()
            .with(eq(user.id))
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));

        let service = store(records, users);

        let access_token = service.rotate(&value).await.unwrap();
        let claims = signer().verify_at(&access_token, at(NOW)).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.roles, vec!["ROLE_ADMIN", "ROLE_USER"]);
        assert_eq!(claims.exp, NOW + 3600);
    }

    #[tokio::test]
    async fn test_rotate_unknown_token() {
        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_find_by_value()
            .times(1)
            .returning(|_| Ok(None));

        let service = store(records, MockTestUserDirectory::new());

        let result = service.rotate("missing").await;
        assert!(matches!(result, Err(RefreshTokenError::NotFound)));
    }

    #[tokio::test]
    async fn test_rotate_revoked_token_is_invalid() {
        let mut token = RefreshToken::issue(UserId::new(), "web", 60, at(NOW - 10)).unwrap();
        token.revoked_at = Some(at(NOW - 5));

        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_find_by_value()
            .times(1)
            .returning(move |_| Ok(Some(token.clone())));
        records.expect_revoke_if_valid().never();

        let service = store(records, MockTestUserDirectory::new());

        let result = service.rotate("value").await;
        assert!(matches!(result, Err(RefreshTokenError::Invalid)));
    }

    #[tokio::test]
    async fn test_rotate_expired_token_is_invalid() {
        let token = RefreshToken::issue(UserId::new(), "web", 10, at(NOW - 10)).unwrap();

        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_find_by_value()
            .times(1)
            .returning(move |_| Ok(Some(token.clone())));
        records.expect_revoke_if_valid().never();

        let service = store(records, MockTestUserDirectory::new());

        let result = service.rotate("value").await;
        assert!(matches!(result, Err(RefreshTokenError::Invalid)));
    }

    #[tokio::test]
    async fn test_rotate_for_disabled_user_is_invalid() {
        let mut user = alice();
        user.enabled = false;
        let token = RefreshToken::issue(user.id, "web", 60, at(NOW)).unwrap();

        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_find_by_value()
            .times(1)
            .returning(move |_| Ok(Some(token.clone())));
        records.expect_revoke_if_valid().never();

        let mut users = MockTestUserDirectory::new();
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = store(records, users);

        let result = service.rotate("value").await;
        assert!(matches!(result, Err(RefreshTokenError::Invalid)));
    }

    #[tokio::test]
    async fn test_rotate_losing_race_is_invalid() {
        let user = alice();
        let token = RefreshToken::issue(user.id, "web", 60, at(NOW)).unwrap();

        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_find_by_value()
            .times(1)
            .returning(move |_| Ok(Some(token.clone())));
        records
            .expect_revoke_if_valid()
            .times(1)
            .returning(|_, _| Ok(false));

        let mut users = MockTestUserDirectory::new();
        users
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = store(records, users);

        let result = service.rotate("value").await;
        assert!(matches!(result, Err(RefreshTokenError::Invalid)));
    }

    #[tokio::test]
    async fn test_revoke_ignores_unknown_value() {
        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_revoke()
            .times(2)
            .returning(|_, _| Ok(false));

        let service = store(records, MockTestUserDirectory::new());

        assert!(service.revoke("missing").await.is_ok());
        assert!(service.revoke("missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_all_for_unknown_user_is_noop() {
        let mut records = MockTestTokenRecordStore::new();
        records.expect_revoke_all_for_user().never();

        let mut users = MockTestUserDirectory::new();
        users
            .expect_find_by_username()
            .times(1)
            .returning(|_| Ok(None));

        let service = store(records, users);

        let count = service
            .revoke_all_for_user(&Username::new("ghost").unwrap())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_revoke_all_for_user_and_client_filters_by_client() {
        let user = alice();
        let user_id = user.id;

        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_revoke_all_for_user_and_client()
            .withf(move |id, client, _| *id == user_id && client == "mobile")
            .times(1)
            .returning(|_, _, _| Ok(2));

        let mut users = MockTestUserDirectory::new();
        users
            .expect_find_by_username()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = store(records, users);

        let count = service
            .revoke_all_for_user_and_client(&Username::new("alice").unwrap(), "mobile")
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_cleanup_uses_retention_cutoff() {
        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_delete_expired_before()
            .withf(|cutoff| *cutoff == at(NOW - 7 * 86400))
            .times(1)
            .returning(|_| Ok(3));

        let service = store(records, MockTestUserDirectory::new());

        assert_eq!(service.cleanup_expired(7).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_create_rejects_out_of_range_ttl() {
        let mut records = MockTestTokenRecordStore::new();
        records.expect_insert().never();

        let service = store(records, MockTestUserDirectory::new());

        for ttl in [i64::MAX, i64::MAX / 1000 + 1, i64::MIN] {
            let result = service.create(&alice(), "web", ttl).await;
            assert!(matches!(result, Err(RefreshTokenError::OutOfRange(_))));
        }
    }

    #[tokio::test]
    async fn test_cleanup_rejects_out_of_range_retention() {
        let mut records = MockTestTokenRecordStore::new();
        records.expect_delete_expired_before().never();

        let service = store(records, MockTestUserDirectory::new());

        for days in [-1, i64::MAX, i64::MAX / 86400] {
            let result = service.cleanup_expired(days).await;
            assert!(matches!(result, Err(RefreshTokenError::OutOfRange(_))));
        }
    }

    #[tokio::test]
    async fn test_database_errors_propagate() {
        let mut records = MockTestTokenRecordStore::new();
        records
            .expect_find_by_value()
            .times(1)
            .returning(|_| Err(RefreshTokenError::DatabaseError("connection reset".to_string())));

        let service = store(records, MockTestUserDirectory::new());

        let result = service.is_token_valid("value").await;
        assert!(matches!(result, Err(RefreshTokenError::DatabaseError(_))));
    }
}
