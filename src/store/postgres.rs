use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    ActivityStore, NewActivity, NewNotification, NewUser, RefreshToken, RefreshTokenStore, User,
    UserStore,
};

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, role, is_deleted, version, created_at";

const TOKEN_COLUMNS: &str = "id, user_id, token_hash, expires_at, revoked, created_at";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<RefreshToken> {
        let row = sqlx::query_as::<_, RefreshToken>(&format!(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_live(&self, now: OffsetDateTime) -> anyhow::Result<Vec<RefreshToken>> {
        let rows = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE revoked = FALSE AND expires_at > $1"
        ))
        .bind(now)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_live_by_user(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Vec<RefreshToken>> {
        let rows = sqlx::query_as::<_, RefreshToken>(&format!(
            r#"
            SELECT {TOKEN_COLUMNS}
            FROM refresh_tokens
            WHERE user_id = $1 AND revoked = FALSE AND expires_at > $2
            ORDER BY created_at ASC
            "#
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn revoke_if_live(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND revoked = FALSE AND expires_at > now()",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() == 1)
    }

    async fn delete_dead_for_user(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query(
            "DELETE FROM refresh_tokens WHERE user_id = $1 AND (revoked = TRUE OR expires_at <= $2)",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected())
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn insert_activity(&self, entry: NewActivity) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (actor_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.details)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn insert_notification(&self, notification: NewNotification) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (recipient_id, actor_id, message)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(notification.recipient_id)
        .bind(notification.actor_id)
        .bind(notification.message)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
