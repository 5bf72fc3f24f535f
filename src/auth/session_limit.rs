use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::store::RefreshTokenStore;

/// Maximum number of live refresh tokens per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLimit {
    Fixed(u32),
    Unlimited,
}

impl SessionLimit {
    /// How many of `live` sessions must go to get back under the limit.
    pub fn excess(&self, live: usize) -> usize {
        match self {
            Self::Fixed(max) => live.saturating_sub(*max as usize),
            Self::Unlimited => 0,
        }
    }
}

impl From<u32> for SessionLimit {
    /// `0` means unlimited.
    fn from(value: u32) -> Self {
        if value == 0 {
            Self::Unlimited
        } else {
            Self::Fixed(value)
        }
    }
}

/// Revokes the user's oldest live sessions until at most `limit` remain.
///
/// Runs after the new token is stored, so the newest session always
/// survives. Count and revoke are separate statements; concurrent logins of
/// the same user can briefly overshoot the cap.
#[instrument(skip(store))]
pub async fn enforce(
    store: &dyn RefreshTokenStore,
    user_id: Uuid,
    limit: SessionLimit,
) -> anyhow::Result<Vec<Uuid>> {
    if limit == SessionLimit::Unlimited {
        return Ok(Vec::new());
    }

    let live = store
        .find_live_by_user(user_id, OffsetDateTime::now_utc())
        .await?;
    let excess = limit.excess(live.len());
    if excess == 0 {
        return Ok(Vec::new());
    }

    let mut pruned = Vec::with_capacity(excess);
    for row in live.iter().take(excess) {
        if store.revoke_if_live(row.id).await? {
            pruned.push(row.id);
        }
    }
    info!(%user_id, pruned = pruned.len(), "session limit reached; oldest sessions revoked");
    Ok(pruned)
}
