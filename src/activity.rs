//! Audit trail and notification writers.
//!
//! Both run after the primary mutation has succeeded. Their failures are
//! logged and dropped; callers never see them.

use std::collections::HashSet;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::store::{ActivityAction, ActivityStore, NewActivity, NewNotification};

/// Who performed the mutation. `None` for system-initiated actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<Uuid>,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    pub fn system() -> Self {
        Self::default()
    }
}

pub async fn record(
    store: &dyn ActivityStore,
    actor: Actor,
    action: ActivityAction,
    entity_type: &'static str,
    entity_id: Uuid,
    details: Value,
) {
    let entry = NewActivity {
        actor_id: actor.user_id,
        action,
        entity_type,
        entity_id,
        details,
    };
    if let Err(e) = store.insert_activity(entry).await {
        warn!(error = %e, action = action.as_str(), %entity_id, "activity log write failed");
    }
}

/// Inserts one notification per recipient. Returns how many were written.
pub async fn notify(
    store: &dyn ActivityStore,
    actor: Actor,
    recipients: &[Uuid],
    message: &str,
) -> usize {
    let mut written = 0;
    for &recipient_id in recipients {
        let notification = NewNotification {
            recipient_id,
            actor_id: actor.user_id,
            message: message.to_string(),
        };
        match store.insert_notification(notification).await {
            Ok(()) => written += 1,
            Err(e) => warn!(error = %e, %recipient_id, "notification write failed"),
        }
    }
    written
}

/// De-duplicated `candidates` minus the actor and the target, in first-seen
/// order.
pub fn recipients(candidates: &[Uuid], actor: Actor, target: Option<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .copied()
        .filter(|id| Some(*id) != actor.user_id && Some(*id) != target)
        .filter(|id| seen.insert(*id))
        .collect()
}

pub fn sessions_pruned_message(count: usize) -> String {
    match count {
        1 => "You were signed out on 1 other device because the session limit was reached."
            .to_string(),
        n => format!(
            "You were signed out on {n} other devices because the session limit was reached."
        ),
    }
}
