//! Persistence seams. Postgres backs them in production; tests use the
//! in-memory implementations.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

#[cfg(test)]
pub mod memory;
pub mod postgres;
mod types;

pub use types::{
    ActivityAction, NewActivity, NewNotification, NewUser, RefreshToken, Role, User,
};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// Returns `None` when the email is already taken.
    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<RefreshToken>;

    /// Every live row, across all users.
    async fn find_live(&self, now: OffsetDateTime) -> anyhow::Result<Vec<RefreshToken>>;

    /// Live rows of one user, oldest first.
    async fn find_live_by_user(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Vec<RefreshToken>>;

    /// Sets `revoked` only if it is currently unset. Returns whether the
    /// update applied.
    async fn revoke_if_live(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn revoke_all_for_user(&self, user_id: Uuid) -> anyhow::Result<u64>;

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;

    /// Deletes a user's expired or revoked rows.
    async fn delete_dead_for_user(&self, user_id: Uuid, now: OffsetDateTime)
        -> anyhow::Result<u64>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn insert_activity(&self, entry: NewActivity) -> anyhow::Result<()>;

    async fn insert_notification(&self, notification: NewNotification) -> anyhow::Result<()>;
}
