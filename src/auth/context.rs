use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::debug;

use super::jwt::JwtKeys;
use crate::error::AppError;
use crate::store::{User, UserStore};

/// Identity resolved for one request. Built before any resolver runs and
/// read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user: Option<User>,
    pub is_authenticated: bool,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(user: User) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
        }
    }

    pub fn require_user(&self) -> Result<&User, AppError> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::unauthenticated("authentication required"))
    }

    /// Never fails: any problem with the credential yields an anonymous
    /// context.
    pub async fn resolve(headers: &HeaderMap, keys: &JwtKeys, users: &dyn UserStore) -> Self {
        let Some(token) = bearer_token(headers) else {
            return Self::anonymous();
        };

        let claims = match keys.verify_access(token) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "access token rejected");
                return Self::anonymous();
            }
        };

        match users.find_by_id(claims.sub).await {
            Ok(Some(user)) if !user.is_deleted => Self::authenticated(user),
            Ok(Some(_)) => {
                debug!(user_id = %claims.sub, "access token for deleted user");
                Self::anonymous()
            }
            Ok(None) => {
                debug!(user_id = %claims.sub, "access token for unknown user");
                Self::anonymous()
            }
            Err(e) => {
                debug!(error = %e, user_id = %claims.sub, "user lookup failed");
                Self::anonymous()
            }
        }
    }
}

/// Extracts `<token>` from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
