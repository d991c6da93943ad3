use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::MfaProfile;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::domain::user::ports::UserDirectory;
use crate::user::errors::UserError;

const USER_COLUMNS: &str = "id, username, email, password_hash, enabled, account_locked, \
     account_expired, credentials_expired, roles, mfa_enabled, mfa_secret, mfa_backup_codes, \
     created_at, last_login_at";

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn database_error(e: sqlx::Error) -> UserError {
    UserError::DatabaseError(e.to_string())
}

fn user_from_row(row: &PgRow) -> Result<User, UserError> {
    let id: Uuid = row.try_get("id").map_err(database_error)?;
    let username: String = row.try_get("username").map_err(database_error)?;
    let email: String = row.try_get("email").map_err(database_error)?;
    let roles: Vec<String> = row.try_get("roles").map_err(database_error)?;
    let mfa_enabled: bool = row.try_get("mfa_enabled").map_err(database_error)?;
    let mfa_secret: Option<String> = row.try_get("mfa_secret").map_err(database_error)?;
    let mfa_backup_codes: Vec<String> = row.try_get("mfa_backup_codes").map_err(database_error)?;

    Ok(User {
        id: UserId(id),
        username: Username::new(username)?,
        email: EmailAddress::new(email)?,
        password_hash: row.try_get("password_hash").map_err(database_error)?,
        enabled: row.try_get("enabled").map_err(database_error)?,
        account_locked: row.try_get("account_locked").map_err(database_error)?,
        account_expired: row.try_get("account_expired").map_err(database_error)?,
        credentials_expired: row.try_get("credentials_expired").map_err(database_error)?,
        roles: roles.into_iter().collect(),
        mfa: MfaProfile::from_parts(mfa_enabled, mfa_secret, mfa_backup_codes),
        created_at: row.try_get("created_at").map_err(database_error)?,
        last_login_at: row.try_get("last_login_at").map_err(database_error)?,
    })
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_by_username(&self, username: &Username) -> Result<Option<User>, UserError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn save(&self, user: User) -> Result<User, UserError> {
        let backup_codes: Vec<String> = user.mfa.backup_codes().iter().cloned().collect();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, enabled, account_locked,
                               account_expired, credentials_expired, roles, mfa_enabled,
                               mfa_secret, mfa_backup_codes, created_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                username = EXCLUDED.username,
                email = EXCLUDED.email,
                password_hash = EXCLUDED.password_hash,
                enabled = EXCLUDED.enabled,
                account_locked = EXCLUDED.account_locked,
                account_expired = EXCLUDED.account_expired,
                credentials_expired = EXCLUDED.credentials_expired,
                roles = EXCLUDED.roles,
                mfa_enabled = EXCLUDED.mfa_enabled,
                mfa_secret = EXCLUDED.mfa_secret,
                mfa_backup_codes = EXCLUDED.mfa_backup_codes,
                last_login_at = EXCLUDED.last_login_at
            "#,
        )
        .bind(user.id.0)
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .bind(user.enabled)
        .bind(user.account_locked)
        .bind(user.account_expired)
        .bind(user.credentials_expired)
        .bind(user.role_names())
        .bind(user.mfa.is_enabled())
        .bind(user.mfa.secret())
        .bind(backup_codes)
        .bind(user.created_at)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    if db_err.constraint() == Some("users_username_key") {
                        return UserError::UsernameAlreadyExists(user.username.to_string());
                    }
                    if db_err.constraint() == Some("users_email_key") {
                        return UserError::EmailAlreadyExists(user.email.to_string());
                    }
                }
            }
            UserError::DatabaseError(e.to_string())
        })?;

        Ok(user)
    }

    async fn consume_backup_code(&self, id: &UserId, code: &str) -> Result<bool, UserError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET mfa_backup_codes = array_remove(mfa_backup_codes, $2)
            WHERE id = $1 AND mfa_enabled AND $2 = ANY(mfa_backup_codes)
            "#,
        )
        .bind(id.0)
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_last_login(&self, id: &UserId, at: DateTime<Utc>) -> Result<(), UserError> {
        let result = sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id.0)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn set_mfa_profile(&self, id: &UserId, profile: &MfaProfile) -> Result<bool, UserError> {
        let backup_codes: Vec<String> = profile.backup_codes().iter().cloned().collect();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET mfa_enabled = $2, mfa_secret = $3, mfa_backup_codes = $4
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(profile.is_enabled())
        .bind(profile.secret())
        .bind(backup_codes)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace_backup_codes(
        &self,
        id: &UserId,
        backup_codes: &BTreeSet<String>,
    ) -> Result<bool, UserError> {
        let backup_codes: Vec<String> = backup_codes.iter().cloned().collect();

        let result = sqlx::query(
            "UPDATE users SET mfa_backup_codes = $2 WHERE id = $1 AND mfa_enabled",
        )
        .bind(id.0)
        .bind(backup_codes)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() == 1)
    }
}
