//! Refresh-token ledger.
//!
//! Raw refresh tokens are random hex strings handed to the client; the
//! database only sees their argon2 hash. Because the hash is salted there is
//! no way to look a token up by value, so `verify` walks the live rows and
//! compares each one. The per-user session cap keeps that set small.

use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::password::SecretHasher;
use crate::store::{RefreshToken, RefreshTokenStore};

/// `len` random bytes from the OS CSPRNG, hex-encoded.
pub fn issue_refresh_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct RefreshLedger {
    store: Arc<dyn RefreshTokenStore>,
    hasher: SecretHasher,
    ttl: Duration,
    token_bytes: usize,
}

impl RefreshLedger {
    pub fn new(
        store: Arc<dyn RefreshTokenStore>,
        hasher: SecretHasher,
        ttl: Duration,
        token_bytes: usize,
    ) -> Self {
        Self {
            store,
            hasher,
            ttl,
            token_bytes,
        }
    }

    pub fn tokens(&self) -> &dyn RefreshTokenStore {
        self.store.as_ref()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self) -> String {
        issue_refresh_token(self.token_bytes)
    }

    #[instrument(skip(self, raw))]
    pub async fn store(&self, user_id: Uuid, raw: &str) -> anyhow::Result<RefreshToken> {
        let hash = self.hasher.hash(raw)?;
        let expires_at = OffsetDateTime::now_utc() + self.ttl;
        let row = self.store.insert(user_id, &hash, expires_at).await?;
        debug!(token_id = %row.id, "refresh token stored");
        Ok(row)
    }

    /// Finds the live row whose hash matches `raw`.
    #[instrument(skip_all)]
    pub async fn verify(&self, raw: &str) -> anyhow::Result<Option<RefreshToken>> {
        let live = self.store.find_live(OffsetDateTime::now_utc()).await?;
        for row in live {
            match self.hasher.verify(raw, &row.token_hash) {
                Ok(true) => return Ok(Some(row)),
                Ok(false) => {}
                Err(e) => {
                    warn!(token_id = %row.id, error = %e, "skipping unreadable refresh token hash");
                }
            }
        }
        Ok(None)
    }

    /// Revokes `old` and stores a successor. `None` means another request
    /// revoked `old` first.
    #[instrument(skip(self, old), fields(token_id = %old.id, user_id = %old.user_id))]
    pub async fn rotate(&self, old: &RefreshToken) -> anyhow::Result<Option<String>> {
        if !self.store.revoke_if_live(old.id).await? {
            warn!("refresh token already revoked; rotation refused");
            return Ok(None);
        }
        let raw = self.issue();
        self.store(old.user_id, &raw).await?;
        Ok(Some(raw))
    }

    /// Deletes the user's expired and revoked rows.
    pub async fn cleanup(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let removed = self
            .store
            .delete_dead_for_user(user_id, OffsetDateTime::now_utc())
            .await?;
        if removed > 0 {
            debug!(%user_id, removed, "refresh tokens cleaned up");
        }
        Ok(removed)
    }

    pub async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        self.store.delete(id).await
    }

    pub async fn revoke_all(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let n = self.store.revoke_all_for_user(user_id).await?;
        info!(%user_id, revoked = n, "all sessions revoked");
        Ok(n)
    }

    /// Live rows of one user, oldest first.
    pub async fn sessions(&self, user_id: Uuid) -> anyhow::Result<Vec<RefreshToken>> {
        self.store
            .find_live_by_user(user_id, OffsetDateTime::now_utc())
            .await
    }
}
