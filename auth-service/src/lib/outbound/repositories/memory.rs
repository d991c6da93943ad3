use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::token::errors::RefreshTokenError;
use crate::domain::token::models::RefreshToken;
use crate::domain::token::ports::TokenRecordStore;
use crate::domain::user::models::MfaProfile;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserDirectory;
use crate::user::errors::UserError;

/// Process-local user directory.
///
/// Every operation runs under one lock and never awaits while holding it.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<UserId, User>>, UserError> {
        self.users
            .lock()
            .map_err(|e| UserError::DatabaseError(e.to_string()))
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError> {
        Ok(self
            .lock()?
            .values()
            .find(|user| &user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn save(&self, user: User) -> Result<User, UserError> {
        let mut users = self.lock()?;

        for other in users.values().filter(|other| other.id != user.id) {
            if other.username == user.username {
                return Err(UserError::UsernameAlreadyExists(user.username.to_string()));
            }
            if other.email == user.email {
                return Err(UserError::EmailAlreadyExists(user.email.to_string()));
            }
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn consume_backup_code(&self, id: &UserId, code: &str) -> Result<bool, UserError> {
        Ok(self
            .lock()?
            .get_mut(id)
            .filter(|user| user.mfa.is_enabled())
            .is_some_and(|user| user.mfa.remove_backup_code(code)))
    }

    async fn update_last_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), UserError> {
        let mut users = self.lock()?;
        let user = users
            .get_mut(id)
            .ok_or_else(|| UserError::NotFound(id.to_string()))?;
        user.last_login_at = Some(at);
        Ok(())
    }

    async fn set_mfa_profile(&self, id: &UserId, profile: &MfaProfile) -> Result<bool, UserError> {
        Ok(self
            .lock()?
            .get_mut(id)
            .map(|user| user.mfa = profile.clone())
            .is_some())
    }

    async fn replace_backup_codes(
        &self,
        id: &UserId,
        backup_codes: &BTreeSet<String>,
    ) -> Result<bool, UserError> {
        Ok(self
            .lock()?
            .get_mut(id)
            .filter(|user| user.mfa.is_enabled())
            .map(|user| user.mfa.replace_backup_codes(backup_codes.clone()))
            .is_some())
    }
}

/// Process-local refresh token store keyed by token value.
///
/// Conditional revokes check and update under the same lock, so concurrent
/// rotations of one value see exactly one success.
#[derive(Debug, Default)]
pub struct InMemoryTokenRecordStore {
    tokens: Mutex<HashMap<String, RefreshToken>>,
}

impl InMemoryTokenRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().map(|tokens| tokens.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, RefreshToken>>, RefreshTokenError> {
        self.tokens
            .lock()
            .map_err(|e| RefreshTokenError::DatabaseError(e.to_string()))
    }

    fn revoke_matching<F>(&self, now: DateTime<Utc>, filter: F) -> Result<u64, RefreshTokenError>
    where
        F: Fn(&RefreshToken) -> bool,
    {
        let mut count = 0;
        for token in self.lock()?.values_mut() {
            if filter(token) && token.is_valid(now) {
                token.revoked_at = Some(now);
                count += 1;
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl TokenRecordStore for InMemoryTokenRecordStore {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, RefreshTokenError> {
        let mut tokens = self.lock()?;
        if tokens.contains_key(&token.token_value) {
            return Err(RefreshTokenError::DuplicateToken);
        }
        tokens.insert(token.token_value.clone(), token.clone());
        Ok(token)
    }

    async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, RefreshTokenError> {
        Ok(self.lock()?.get(value).cloned())
    }

    async fn revoke_if_valid(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RefreshTokenError> {
        match self.lock()?.get_mut(value) {
            Some(token) if token.is_valid(now) => {
                token.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, value: &str, now: DateTime<Utc>) -> Result<bool, RefreshTokenError> {
        match self.lock()?.get_mut(value) {
            Some(token) if token.revoked_at.is_none() => {
                token.revoked_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, RefreshTokenError> {
        self.revoke_matching(now, |token| &token.user_id == user_id)
    }

    async fn revoke_all_for_user_and_client(
        &self,
        user_id: &UserId,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, RefreshTokenError> {
        self.revoke_matching(now, |token| {
            &token.user_id == user_id && token.client_id == client_id
        })
    }

    async fn find_valid_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, RefreshTokenError> {
        let mut valid: Vec<RefreshToken> = self
            .lock()?
            .values()
            .filter(|token| &token.user_id == user_id && token.is_valid(now))
            .cloned()
            .collect();
        valid.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(valid)
    }

    async fn delete_expired_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RefreshTokenError> {
        let mut tokens = self.lock()?;
        let before = tokens.len();
        tokens.retain(|_, token| token.expires_at >= cutoff);
        Ok((before - tokens.len()) as u64)
    }
}
