use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::MfaProfile;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::user::errors::NotifierError;
use crate::user::errors::UserError;

/// Read access to user records plus the few writes authentication needs.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Retrieve user by username.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError>;

    /// Retrieve user by identifier.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Insert or replace a user record.
    ///
    /// # Returns
    /// Stored user entity
    ///
    /// # Errors
    /// * `UsernameAlreadyExists` - Another user holds the username
    /// * `EmailAlreadyExists` - Another user holds the email
    /// * `DatabaseError` - Database operation failed
    async fn save(&self, user: User) -> Result<User, UserError>;

    /// Remove a backup code from an enabled MFA profile in one atomic step.
    ///
    /// # Returns
    /// `true` if the code was present and is now gone, `false` otherwise
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn consume_backup_code(&self, id: &UserId, code: &str) -> Result<bool, UserError>;

    /// Record a successful login without touching other columns.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Database operation failed
    async fn update_last_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), UserError>;

    /// Overwrite only the MFA columns of a user.
    ///
    /// # Returns
    /// `false` if the user does not exist
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn set_mfa_profile(&self, id: &UserId, profile: &MfaProfile) -> Result<bool, UserError>;

    /// Swap the backup codes of an enabled MFA profile in one atomic step.
    ///
    /// # Returns
    /// `false` if the user does not exist or has MFA disabled
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn replace_backup_codes(
        &self,
        id: &UserId,
        backup_codes: &BTreeSet<String>,
    ) -> Result<bool, UserError>;
}

/// Outbound account emails.
///
/// Callers dispatch these without awaiting delivery; an error is only ever
/// logged.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Sent by the account-management collaborator on registration.
    ///
    /// # Arguments
    /// * `to` - Recipient address
    /// * `token` - Opaque verification token to embed in the link
    async fn send_verification_email(
        &self,
        to: &EmailAddress,
        token: &str,
    ) -> Result<(), NotifierError>;

    /// Sent by the account-management collaborator on a reset request.
    ///
    /// # Arguments
    /// * `to` - Recipient address
    /// * `token` - Opaque reset token to embed in the link
    async fn send_password_reset(&self, to: &EmailAddress, token: &str)
        -> Result<(), NotifierError>;

    /// Sent by the account-management collaborator once an email is verified.
    async fn send_welcome(&self, to: &EmailAddress, username: &Username)
        -> Result<(), NotifierError>;

    /// Confirmation that a second factor was enrolled on the account.
    async fn send_mfa_enabled(
        &self,
        to: &EmailAddress,
        username: &Username,
    ) -> Result<(), NotifierError>;
}
