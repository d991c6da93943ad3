use std::sync::Arc;

use auth::AccessClaims;
use auth::CredentialHasher;
use auth::TokenSigner;
use once_cell::sync::OnceCell;

use crate::domain::clock::Clock;
use crate::domain::mfa::service::MfaEngine;
use crate::domain::session::errors::SessionError;
use crate::domain::session::models::LoginCommand;
use crate::domain::session::models::LoginOutcome;
use crate::domain::token::ports::TokenRecordStore;
use crate::domain::token::service::RefreshTokenStore;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::Notifier;
use crate::domain::user::ports::UserDirectory;

/// Password hashed once and checked on the unknown-user login path.
const DECOY_PASSWORD: &str = "decoy password for unknown users";

/// Login, refresh, logout and MFA flows over the token and MFA services.
pub struct AuthOrchestrator<UD, TS, N, H>
where
    UD: UserDirectory,
    TS: TokenRecordStore,
    N: Notifier,
    H: CredentialHasher,
{
    users: Arc<UD>,
    tokens: Arc<RefreshTokenStore<TS, UD>>,
    mfa: Arc<MfaEngine<UD, N>>,
    signer: Arc<TokenSigner>,
    hasher: Arc<H>,
    decoy_hash: OnceCell<String>,
    clock: Arc<dyn Clock>,
    refresh_token_ttl_secs: i64,
}

impl<UD, TS, N, H> AuthOrchestrator<UD, TS, N, H>
where
    UD: UserDirectory,
    TS: TokenRecordStore,
    N: Notifier,
    H: CredentialHasher,
{
    /// Access token lifetime is taken from `tokens` so rotation and login agree.
    pub fn new(
        users: Arc<UD>,
        tokens: Arc<RefreshTokenStore<TS, UD>>,
        mfa: Arc<MfaEngine<UD, N>>,
        signer: Arc<TokenSigner>,
        hasher: Arc<H>,
        clock: Arc<dyn Clock>,
        refresh_token_ttl_secs: i64,
    ) -> Self {
        Self {
            users,
            tokens,
            mfa,
            signer,
            hasher,
            decoy_hash: OnceCell::new(),
            clock,
            refresh_token_ttl_secs,
        }
    }

    /// Check the password and issue an access and refresh token.
    ///
    /// MFA is not evaluated here; `mfa_required` tells the caller whether
    /// `verify_mfa` must follow.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown user or wrong password
    /// * `AccountDisabled` / `AccountLocked` / `AccountExpired` / `CredentialsExpired` - Account status
    /// * `Password` - Stored hash is unusable
    pub async fn login(&self, command: LoginCommand) -> Result<LoginOutcome, SessionError> {
        let username =
            Username::new(command.username).map_err(|_| SessionError::InvalidCredentials)?;

        let Some(user) = self.users.find_by_username(&username).await? else {
            self.verify_decoy(&command.password);
            tracing::info!(username = %username, "Login rejected: unknown user");
            return Err(SessionError::InvalidCredentials);
        };

        if !self.hasher.verify(&command.password, &user.password_hash)? {
            tracing::info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(SessionError::InvalidCredentials);
        }

        check_account_status(&user)?;

        let now = self.clock.now();
        let expires_in = self.tokens.access_token_ttl_secs();
        let access_token =
            self.signer
                .issue_at(user.username.as_str(), &user.role_names(), expires_in, now)?;
        let refresh_token = self
            .tokens
            .create(&user, &command.client_id, self.refresh_token_ttl_secs)
            .await?;

        if let Err(e) = self.users.update_last_login(&user.id, now).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to record last login");
        }

        let mfa_required = user.mfa.is_enabled();
        tracing::info!(
            user_id = %user.id,
            client_id = %command.client_id,
            mfa_required,
            "Login succeeded"
        );

        Ok(LoginOutcome {
            access_token,
            refresh_token: refresh_token.token_value,
            expires_in,
            mfa_required,
            user_id: user.id,
        })
    }

    /// Second factor step; `Ok(false)` for a wrong code.
    pub async fn verify_mfa(&self, user_id: &UserId, code: &str) -> Result<bool, SessionError> {
        Ok(self.mfa.verify(user_id, code).await?)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    /// * `RefreshRejected` - Token unknown, expired, revoked or already used
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, SessionError> {
        Ok(self.tokens.rotate(refresh_token).await?)
    }

    /// Revoke one refresh token. Succeeds when there is nothing to revoke.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), SessionError> {
        Ok(self.tokens.revoke(refresh_token).await?)
    }

    /// Revoke the user's tokens for one client.
    ///
    /// # Returns
    /// Number of tokens revoked
    pub async fn logout_client(&self, username: &str, client_id: &str) -> Result<u64, SessionError> {
        let Ok(username) = Username::new(username) else {
            return Ok(0);
        };
        Ok(self
            .tokens
            .revoke_all_for_user_and_client(&username, client_id)
            .await?)
    }

    /// Revoke every refresh token of the user.
    ///
    /// # Returns
    /// Number of tokens revoked
    pub async fn logout_all(&self, username: &str) -> Result<u64, SessionError> {
        let Ok(username) = Username::new(username) else {
            return Ok(0);
        };
        Ok(self.tokens.revoke_all_for_user(&username).await?)
    }

    /// Verify an access token against the service clock.
    pub fn authenticate(&self, access_token: &str) -> Result<AccessClaims, SessionError> {
        Ok(self.signer.verify_at(access_token, self.clock.now())?)
    }

    pub fn tokens(&self) -> &Arc<RefreshTokenStore<TS, UD>> {
        &self.tokens
    }

    pub fn mfa(&self) -> &Arc<MfaEngine<UD, N>> {
        &self.mfa
    }

    /// Run one password check for a username that does not exist, so the
    /// rejection costs the same as a wrong password.
    fn verify_decoy(&self, password: &str) {
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| self.hasher.hash(DECOY_PASSWORD));

        match decoy {
            Ok(hash) => {
                let _ = self.hasher.verify(password, hash);
            }
            Err(e) => tracing::warn!(error = %e, "Failed to hash decoy password"),
        }
    }
}

fn check_account_status(user: &User) -> Result<(), SessionError> {
    let rejection = if !user.enabled {
        SessionError::AccountDisabled
    } else if user.account_locked {
        SessionError::AccountLocked
    } else if user.account_expired {
        SessionError::AccountExpired
    } else if user.credentials_expired {
        SessionError::CredentialsExpired
    } else {
        return Ok(());
    };

    tracing::info!(user_id = %user.id, reason = %rejection, "Login rejected: account status");
    Err(rejection)
}
