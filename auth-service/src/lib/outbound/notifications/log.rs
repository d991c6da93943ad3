use async_trait::async_trait;

use crate::config::NotificationConfig;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Username;
use crate::domain::user::ports::Notifier;
use crate::user::errors::NotifierError;

/// Rendered message ready for a mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Notifier that renders account emails and writes them to the log.
///
/// Stands in for an SMTP transport; nothing leaves the process.
pub struct LogNotifier {
    from: String,
    base_url: String,
}

impl LogNotifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            from: config.from.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn verification_email(&self, to: &EmailAddress, token: &str) -> OutboundEmail {
        self.compose(
            to,
            "Verify Your Email Address",
            format!(
                "Please verify your email address by opening the link below:\n\n{}/verify-email?token={}\n\nThis link expires in 24 hours.",
                self.base_url, token
            ),
        )
    }

    pub fn password_reset_email(&self, to: &EmailAddress, token: &str) -> OutboundEmail {
        self.compose(
            to,
            "Password Reset Request",
            format!(
                "A password reset was requested for your account. Open the link below to choose a new password:\n\n{}/reset-password?token={}\n\nIf you did not request this, ignore this email.",
                self.base_url, token
            ),
        )
    }

    pub fn welcome_email(&self, to: &EmailAddress, username: &Username) -> OutboundEmail {
        self.compose(
            to,
            "Welcome to Auth Server",
            format!("Hello {username},\n\nYour account is ready to use."),
        )
    }

    pub fn mfa_enabled_email(&self, to: &EmailAddress, username: &Username) -> OutboundEmail {
        self.compose(
            to,
            "MFA Setup Completed",
            format!(
                "Hello {username},\n\nMulti-factor authentication is now enabled on your account. Keep your backup codes somewhere safe.\n\nIf you did not make this change, contact support immediately."
            ),
        )
    }

    fn compose(&self, to: &EmailAddress, subject: &str, body: String) -> OutboundEmail {
        OutboundEmail {
            from: self.from.clone(),
            to: to.as_str().to_string(),
            subject: subject.to_string(),
            body,
        }
    }

    fn deliver(&self, email: OutboundEmail) -> Result<(), NotifierError> {
        tracing::info!(
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            "Email dispatched"
        );
        tracing::debug!(body = %email.body, "Email body");
        Ok(())
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification_email(
        &self,
        to: &EmailAddress,
        token: &str,
    ) -> Result<(), NotifierError> {
        self.deliver(self.verification_email(to, token))
    }

    async fn send_password_reset(&self, to: &EmailAddress, token: &str) -> Result<(), NotifierError> {
        self.deliver(self.password_reset_email(to, token))
    }

    async fn send_welcome(&self, to: &EmailAddress, username: &Username) -> Result<(), NotifierError> {
        self.deliver(self.welcome_email(to, username))
    }

    async fn send_mfa_enabled(
        &self,
        to: &EmailAddress,
        username: &Username,
    ) -> Result<(), NotifierError> {
        self.deliver(self.mfa_enabled_email(to, username))
    }
}
