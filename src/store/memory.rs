use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    ActivityStore, NewActivity, NewNotification, NewUser, RefreshToken, RefreshTokenStore, Role,
    User, UserStore,
};

/// Vec-backed stand-in for Postgres. Rows keep insertion order.
#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<Vec<User>>,
    pub tokens: Mutex<Vec<RefreshToken>>,
    pub activity: Mutex<Vec<NewActivity>>,
    pub notifications: Mutex<Vec<NewNotification>>,
    /// Makes every activity/notification write fail.
    pub fail_side_effects: bool,
    /// Makes `find_live_by_user` fail, which is what the session cap reads.
    pub fail_session_listing: bool,
}

impl MemoryStore {
    pub fn live_tokens_of(&self, user_id: Uuid) -> usize {
        let now = OffsetDateTime::now_utc();
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id && t.is_live(now))
            .count()
    }

    pub fn soft_delete(&self, user_id: Uuid) {
        for u in self.users.lock().unwrap().iter_mut() {
            if u.id == user_id {
                u.is_deleted = true;
                u.version += 1;
            }
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(&self, new: NewUser<'_>) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == new.email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email.to_string(),
            password_hash: new.password_hash.to_string(),
            first_name: new.first_name.to_string(),
            last_name: new.last_name.to_string(),
            role: Role::Member,
            is_deleted: false,
            version: 1,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(Some(user))
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<RefreshToken> {
        let row = RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            revoked: false,
            created_at: OffsetDateTime::now_utc(),
        };
        self.tokens.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn find_live(&self, now: OffsetDateTime) -> anyhow::Result<Vec<RefreshToken>> {
        let tokens = self.tokens.lock().unwrap();
        Ok(tokens.iter().filter(|t| t.is_live(now)).cloned().collect())
    }

    async fn find_live_by_user(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<Vec<RefreshToken>> {
        if self.fail_session_listing {
            anyhow::bail!("session listing unavailable");
        }
        let tokens = self.tokens.lock().unwrap();
        let mut rows: Vec<RefreshToken> = tokens
            .iter()
            .filter(|t| t.user_id == user_id && t.is_live(now))
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.created_at);
        Ok(rows)
    }

    async fn revoke_if_live(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut tokens = self.tokens.lock().unwrap();
        match tokens.iter_mut().find(|t| t.id == id && !t.revoked) {
            Some(t) => {
                t.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let now = OffsetDateTime::now_utc();
        let mut tokens = self.tokens.lock().unwrap();
        let mut n = 0;
        for t in tokens.iter_mut().filter(|t| t.user_id == user_id && t.is_live(now)) {
            t.revoked = true;
            n += 1;
        }
        Ok(n)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|t| t.id != id);
        Ok(tokens.len() != before)
    }

    async fn delete_dead_for_user(
        &self,
        user_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<u64> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|t| t.user_id != user_id || t.is_live(now));
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn insert_activity(&self, entry: NewActivity) -> anyhow::Result<()> {
        if self.fail_side_effects {
            anyhow::bail!("activity table unavailable");
        }
        self.activity.lock().unwrap().push(entry);
        Ok(())
    }

    async fn insert_notification(&self, notification: NewNotification) -> anyhow::Result<()> {
        if self.fail_side_effects {
            anyhow::bail!("notification table unavailable");
        }
        self.notifications.lock().unwrap().push(notification);
        Ok(())
    }
}
