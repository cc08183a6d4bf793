use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, is_active, date_joined";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: OffsetDateTime,
}

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub password_hash: &'a str,
}

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn username_taken(db: &PgPool, username: &str) -> anyhow::Result<bool> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(db)
                .await?;
        Ok(row.is_some())
    }

    /// True when another user already owns this email.
    pub async fn email_taken(db: &PgPool, email: &str, exclude: Option<Uuid>) -> anyhow::Result<bool> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 AND id IS DISTINCT FROM $2")
                .bind(email)
                .bind(exclude)
                .fetch_optional(db)
                .await?;
        Ok(row.is_some())
    }

    pub async fn create(db: &PgPool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.username)
        .bind(new.email)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET email = $2, first_name = $3, last_name = $4
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn set_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Cascades through every owned table via the FK constraints.
    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ApiToken {
    pub key: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
}

impl ApiToken {
    /// Return the user's static token, creating it on first use.
    pub async fn get_or_create(db: &PgPool, user_id: Uuid) -> anyhow::Result<ApiToken> {
        if let Some(token) =
            sqlx::query_as::<_, ApiToken>("SELECT key, user_id, created_at FROM api_tokens WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(db)
                .await?
        {
            return Ok(token);
        }
        let token = sqlx::query_as::<_, ApiToken>(
            r#"
            INSERT INTO api_tokens (key, user_id)
            VALUES ($1, $2)
            RETURNING key, user_id, created_at
            "#,
        )
        .bind(random_key(40))
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(token)
    }

    pub async fn find_user(db: &PgPool, key: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.first_name, u.last_name,
                   u.password_hash, u.is_active, u.date_joined
            FROM api_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub key: String,
    pub user_id: Uuid,
    pub csrf_token: String,
    pub expires_at: OffsetDateTime,
}

impl Session {
    pub async fn create(db: &PgPool, user_id: Uuid, ttl_minutes: i64) -> anyhow::Result<Session> {
        let expires_at = OffsetDateTime::now_utc() + time::Duration::minutes(ttl_minutes);
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (key, user_id, csrf_token, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING key, user_id, csrf_token, expires_at
            "#,
        )
        .bind(random_key(32))
        .bind(user_id)
        .bind(random_key(32))
        .bind(expires_at)
        .fetch_one(db)
        .await?;
        Ok(session)
    }

    pub async fn find_valid(db: &PgPool, key: &str) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT key, user_id, csrf_token, expires_at
            FROM sessions
            WHERE key = $1 AND expires_at > now()
            "#,
        )
        .bind(key)
        .fetch_optional(db)
        .await?;
        Ok(session)
    }

    pub async fn delete(db: &PgPool, key: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE key = $1")
            .bind(key)
            .execute(db)
            .await?;
        Ok(())
    }
}

/// Register a refresh token's jti in the allow-list.
pub async fn register_refresh(
    db: &PgPool,
    jti: Uuid,
    user_id: Uuid,
    expires_at: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query("INSERT INTO refresh_tokens (jti, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(db)
        .await?;
    Ok(())
}

/// Revoke a refresh token, returning false when it was unknown, expired or
/// already used. A single jti can be consumed exactly once.
pub async fn consume_refresh(db: &PgPool, jti: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET revoked_at = now()
        WHERE jti = $1 AND revoked_at IS NULL AND expires_at > now()
        "#,
    )
    .bind(jti)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) fn random_key(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_keys_have_requested_length_and_differ() {
        let a = random_key(40);
        let b = random_key(40);
        assert_eq!(a.len(), 40);
        assert_eq!(b.len(), 40);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
