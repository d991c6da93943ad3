use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::token::errors::RefreshTokenError;
use crate::domain::token::models::RefreshToken;
use crate::domain::token::ports::TokenRecordStore;
use crate::domain::user::models::UserId;

const TOKEN_COLUMNS: &str =
    "id, token_value, user_id, client_id, expires_at, revoked_at, replaced_by, created_at";

/// Refresh tokens in Postgres.
///
/// Conditional revokes are single `UPDATE` statements guarded by their
/// `WHERE` clause; the affected row count decides the winner.
pub struct PostgresTokenRecordStore {
    pool: PgPool,
}

impl PostgresTokenRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn database_error(e: sqlx::Error) -> RefreshTokenError {
    RefreshTokenError::DatabaseError(e.to_string())
}

fn token_from_row(row: &PgRow) -> Result<RefreshToken, RefreshTokenError> {
    let user_id: Uuid = row.try_get("user_id").map_err(database_error)?;

    Ok(RefreshToken {
        id: row.try_get("id").map_err(database_error)?,
        token_value: row.try_get("token_value").map_err(database_error)?,
        user_id: UserId(user_id),
        client_id: row.try_get("client_id").map_err(database_error)?,
        expires_at: row.try_get("expires_at").map_err(database_error)?,
        revoked_at: row.try_get("revoked_at").map_err(database_error)?,
        replaced_by: row.try_get("replaced_by").map_err(database_error)?,
        created_at: row.try_get("created_at").map_err(database_error)?,
    })
}

#[async_trait]
impl TokenRecordStore for PostgresTokenRecordStore {
    async fn insert(&self, token: RefreshToken) -> Result<RefreshToken, RefreshTokenError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, token_value, user_id, client_id, expires_at,
                                        revoked_at, replaced_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.id)
        .bind(&token.token_value)
        .bind(token.user_id.0)
        .bind(&token.client_id)
        .bind(token.expires_at)
        .bind(token.revoked_at)
        .bind(token.replaced_by)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation()
                    && db_err.constraint() == Some("refresh_tokens_token_value_key")
                {
                    return RefreshTokenError::DuplicateToken;
                }
            }
            database_error(e)
        })?;

        Ok(token)
    }

    async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, RefreshTokenError> {
        let row = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE token_value = $1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        row.as_ref().map(token_from_row).transpose()
    }

    async fn revoke_if_valid(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RefreshTokenError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE token_value = $1 AND revoked_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke(&self, value: &str, now: DateTime<Utc>) -> Result<bool, RefreshTokenError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE token_value = $1 AND revoked_at IS NULL",
        )
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<u64, RefreshTokenError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $2
            WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $2
            "#,
        )
        .bind(user_id.0)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected())
    }

    async fn revoke_all_for_user_and_client(
        &self,
        user_id: &UserId,
        client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, RefreshTokenError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = $3
            WHERE user_id = $1 AND client_id = $2 AND revoked_at IS NULL AND expires_at > $3
            "#,
        )
        .bind(user_id.0)
        .bind(client_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected())
    }

    async fn find_valid_for_user(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<RefreshToken>, RefreshTokenError> {
        let rows = sqlx::query(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens \
             WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > $2 \
             ORDER BY created_at DESC"
        ))
        .bind(user_id.0)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.iter().map(token_from_row).collect()
    }

    async fn delete_expired_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RefreshTokenError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        Ok(result.rows_affected())
    }
}
