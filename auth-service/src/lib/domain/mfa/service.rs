use std::sync::Arc;

use auth::TotpGenerator;
use auth::TotpSecret;

use crate::domain::clock::Clock;
use crate::domain::mfa::errors::MfaError;
use crate::domain::mfa::models::generate_backup_codes;
use crate::domain::mfa::models::MfaSetup;
use crate::domain::user::models::MfaProfile;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::Notifier;
use crate::domain::user::ports::UserDirectory;

/// TOTP enrollment and verification with single-use backup codes.
///
/// Per user: `Disabled -> Enrolled(secret, codes) -> Disabled`.
pub struct MfaEngine<UD, N>
where
    UD: UserDirectory,
    N: Notifier,
{
    users: Arc<UD>,
    notifier: Arc<N>,
    generator: TotpGenerator,
    clock: Arc<dyn Clock>,
}

impl<UD, N> MfaEngine<UD, N>
where
    UD: UserDirectory,
    N: Notifier,
{
    pub fn new(
        users: Arc<UD>,
        notifier: Arc<N>,
        generator: TotpGenerator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            notifier,
            generator,
            clock,
        }
    }

    /// Enroll the user with a fresh secret and backup codes.
    ///
    /// Replaces any existing enrollment.
    ///
    /// # Errors
    /// * `UserNotFound` - No such user
    /// * `User` - Directory failure
    pub async fn setup(&self, user_id: &UserId) -> Result<MfaSetup, MfaError> {
        let user = self.load(user_id).await?;

        let secret = TotpSecret::generate();
        let encoded = secret.to_encoded();
        let backup_codes = generate_backup_codes();

        let profile = MfaProfile::enrolled(encoded.clone(), backup_codes.clone());
        if !self.users.set_mfa_profile(&user.id, &profile).await? {
            return Err(MfaError::UserNotFound(user_id.to_string()));
        }

        tracing::info!(user_id = %user.id, "MFA enrolled");
        self.notify_enabled(&user);

        Ok(MfaSetup {
            provisioning_uri: self
                .generator
                .provisioning_uri(user.username.as_str(), &secret),
            secret: encoded,
            backup_codes: backup_codes.into_iter().collect(),
        })
    }

    /// Check a backup code or a TOTP code.
    ///
    /// A matching backup code is consumed. TOTP codes are accepted for the
    /// current step and the adjacent ones.
    ///
    /// # Returns
    /// `false` for a code that matches nothing
    ///
    /// # Errors
    /// * `MfaNotEnabled` - User has no active enrollment
    /// * `UserNotFound` - No such user
    /// * `Totp` - Stored secret is unusable
    pub async fn verify(&self, user_id: &UserId, code: &str) -> Result<bool, MfaError> {
        let user = self.load(user_id).await?;
        if !user.mfa.is_enabled() {
            return Err(MfaError::MfaNotEnabled);
        }

        if user.mfa.has_backup_code(code) && self.users.consume_backup_code(&user.id, code).await?
        {
            tracing::info!(
                user_id = %user.id,
                remaining = user.mfa.backup_codes().len() - 1,
                "Backup code consumed"
            );
            return Ok(true);
        }

        let secret = user.mfa.secret().ok_or(MfaError::MfaNotEnabled)?;
        let secret = TotpSecret::from_encoded(secret)?;
        let accepted = self
            .generator
            .verify_at(&secret, code, self.clock.now().timestamp())?;

        tracing::debug!(user_id = %user.id, accepted, "TOTP verification");
        Ok(accepted)
    }

    /// Clear the secret and backup codes. Idempotent.
    ///
    /// # Errors
    /// * `UserNotFound` - No such user
    pub async fn disable(&self, user_id: &UserId) -> Result<(), MfaError> {
        if !self
            .users
            .set_mfa_profile(user_id, &MfaProfile::disabled())
            .await?
        {
            return Err(MfaError::UserNotFound(user_id.to_string()));
        }

        tracing::info!(user_id = %user_id, "MFA disabled");
        Ok(())
    }

    /// Replace every backup code; previous codes stop working.
    ///
    /// # Errors
    /// * `MfaNotEnabled` - User has no active enrollment
    /// * `UserNotFound` - No such user
    pub async fn regenerate_backup_codes(&self, user_id: &UserId) -> Result<Vec<String>, MfaError> {
        let backup_codes = generate_backup_codes();
        if !self
            .users
            .replace_backup_codes(user_id, &backup_codes)
            .await?
        {
            // Missing user or no enrollment; load tells the two apart
            self.load(user_id).await?;
            return Err(MfaError::MfaNotEnabled);
        }

        tracing::info!(user_id = %user_id, "Backup codes regenerated");
        Ok(backup_codes.into_iter().collect())
    }

    pub async fn is_enabled(&self, user_id: &UserId) -> Result<bool, MfaError> {
        Ok(self.load(user_id).await?.mfa.is_enabled())
    }

    async fn load(&self, user_id: &UserId) -> Result<User, MfaError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| MfaError::UserNotFound(user_id.to_string()))
    }

    fn notify_enabled(&self, user: &User) {
        let notifier = Arc::clone(&self.notifier);
        let email = user.email.clone();
        let username = user.username.clone();
        let user_id = user.id;

        tokio::spawn(async move {
            if let Err(e) = notifier.send_mfa_enabled(&email, &username).await {
                tracing::error!(user_id = %user_id, error = %e, "Failed to send MFA enabled notification");
            }
        });
    }
}
