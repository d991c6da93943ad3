use serde::Serialize;

use crate::domain::user::models::UserId;

/// Credentials presented at login.
#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub username: String,
    pub password: String,
    /// Device or application the refresh token is bound to
    pub client_id: String,
}

impl LoginCommand {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            client_id: client_id.into(),
        }
    }
}

/// Tokens handed back after a successful password check.
///
/// When `mfa_required` is set the caller must complete
/// `AuthOrchestrator::verify_mfa` before treating the session as fully
/// authenticated.
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub mfa_required: bool,
    #[serde(serialize_with = "serialize_user_id")]
    pub user_id: UserId,
}

fn serialize_user_id<S>(user_id: &UserId, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(user_id)
}
