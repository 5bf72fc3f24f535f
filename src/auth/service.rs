use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    jwt::JwtKeys,
    ledger::RefreshLedger,
    password::SecretHasher,
    session_limit::{self, SessionLimit},
    validation::{normalize_email, validate_email, validate_name, validate_password},
};
use crate::{
    activity::{self, Actor},
    error::AppError,
    store::{ActivityAction, ActivityStore, NewUser, RefreshToken, User, UserStore},
};

pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Credentials handed back after register, login or refresh.
#[derive(Debug)]
pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Register, login, refresh and logout on top of the stores.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    activity: Arc<dyn ActivityStore>,
    keys: JwtKeys,
    hasher: SecretHasher,
    ledger: RefreshLedger,
    limit: SessionLimit,
    /// Compared against when the account is missing, so unknown emails cost
    /// one argon2 verification like a wrong password does.
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        activity: Arc<dyn ActivityStore>,
        keys: JwtKeys,
        hasher: SecretHasher,
        ledger: RefreshLedger,
        limit: SessionLimit,
    ) -> anyhow::Result<Self> {
        let dummy_hash = hasher.hash("taskforge-missing-account")?.into();
        Ok(Self {
            users,
            activity,
            keys,
            hasher,
            ledger,
            limit,
            dummy_hash,
        })
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub fn users(&self) -> &dyn UserStore {
        self.users.as_ref()
    }

    pub fn ledger(&self) -> &RefreshLedger {
        &self.ledger
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<IssuedSession, AppError> {
        let email = normalize_email(&input.email);
        validate_email(&email)?;
        validate_password(&input.password)?;
        let first_name = validate_name("firstName", &input.first_name)?;
        let last_name = validate_name("lastName", &input.last_name)?;

        if self.users.find_by_email(&email).await?.is_some() {
            warn!("email already registered");
            return Err(AppError::Conflict("email already registered".into()));
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let user = self
            .users
            .create(NewUser {
                email: &email,
                password_hash: &password_hash,
                first_name,
                last_name,
            })
            .await?
            .ok_or_else(|| AppError::Conflict("email already registered".into()))?;

        let session = self.open_session(user).await?;
        activity::record(
            self.activity.as_ref(),
            Actor::user(session.user.id),
            ActivityAction::UserRegistered,
            "user",
            session.user.id,
            json!({ "email": session.user.email }),
        )
        .await;
        info!(user_id = %session.user.id, "user registered");
        Ok(session)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AppError> {
        let email = normalize_email(email);
        if !super::validation::is_valid_email(&email) {
            return Err(AppError::InvalidCredentials);
        }

        let user = match self.users.find_by_email(&email).await? {
            Some(u) if !u.is_deleted => u,
            _ => {
                let _ = self.hasher.verify(password, &self.dummy_hash);
                warn!("login for unknown or deleted account");
                return Err(AppError::InvalidCredentials);
            }
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        let session = self.open_session(user).await?;
        activity::record(
            self.activity.as_ref(),
            Actor::user(session.user.id),
            ActivityAction::UserLoggedIn,
            "user",
            session.user.id,
            json!({}),
        )
        .await;
        info!(user_id = %session.user.id, "user logged in");
        Ok(session)
    }

    /// Exchanges a refresh token for a new pair. The presented token is
    /// revoked.
    #[instrument(skip_all)]
    pub async fn refresh(&self, raw: Option<&str>) -> Result<IssuedSession, AppError> {
        let raw = raw.ok_or_else(|| AppError::unauthenticated("refresh token missing"))?;

        let row = self
            .ledger
            .verify(raw)
            .await?
            .ok_or_else(|| AppError::unauthenticated("invalid refresh token"))?;

        let user = match self.users.find_by_id(row.user_id).await? {
            Some(u) if !u.is_deleted => u,
            _ => {
                warn!(user_id = %row.user_id, "refresh for unknown or deleted account");
                self.ledger.delete(row.id).await?;
                return Err(AppError::unauthenticated("invalid refresh token"));
            }
        };

        let refresh_token = self
            .ledger
            .rotate(&row)
            .await?
            .ok_or_else(|| AppError::unauthenticated("invalid refresh token"))?;

        self.after_store(&user).await;
        let access_token = self.keys.sign_access(user.id)?;

        activity::record(
            self.activity.as_ref(),
            Actor::user(user.id),
            ActivityAction::SessionRefreshed,
            "refresh_token",
            row.id,
            json!({}),
        )
        .await;
        info!(user_id = %user.id, "session refreshed");
        Ok(IssuedSession {
            access_token,
            refresh_token,
            user,
        })
    }

    /// Deletes the ledger row behind `raw`, if any. Calling it again with the
    /// same value is a no-op.
    #[instrument(skip_all)]
    pub async fn logout(&self, raw: Option<&str>) -> Result<(), AppError> {
        let Some(raw) = raw else {
            return Ok(());
        };
        let Some(row) = self.ledger.verify(raw).await? else {
            return Ok(());
        };
        self.ledger.delete(row.id).await?;
        activity::record(
            self.activity.as_ref(),
            Actor::user(row.user_id),
            ActivityAction::UserLoggedOut,
            "refresh_token",
            row.id,
            json!({}),
        )
        .await;
        info!(user_id = %row.user_id, "user logged out");
        Ok(())
    }

    /// Revokes every live session of `user`. Access tokens already issued
    /// stay valid until they expire.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn logout_all(&self, user: &User) -> Result<u64, AppError> {
        let revoked = self.ledger.revoke_all(user.id).await?;
        self.cleanup(user.id).await;
        activity::record(
            self.activity.as_ref(),
            Actor::user(user.id),
            ActivityAction::SessionsRevokedAll,
            "user",
            user.id,
            json!({ "revoked": revoked }),
        )
        .await;
        Ok(revoked)
    }

    pub async fn sessions(&self, user: &User) -> Result<Vec<RefreshToken>, AppError> {
        Ok(self.ledger.sessions(user.id).await?)
    }

    async fn open_session(&self, user: User) -> Result<IssuedSession, AppError> {
        let refresh_token = self.ledger.issue();
        self.ledger.store(user.id, &refresh_token).await?;
        self.after_store(&user).await;
        let access_token = self.keys.sign_access(user.id)?;
        Ok(IssuedSession {
            access_token,
            refresh_token,
            user,
        })
    }

    /// Session cap, then opportunistic cleanup. The new row is already stored,
    /// so failures here are logged and the session still goes out.
    async fn after_store(&self, user: &User) {
        let pruned = match session_limit::enforce(self.ledger.tokens(), user.id, self.limit).await {
            Ok(pruned) => pruned,
            Err(e) => {
                warn!(error = %e, user_id = %user.id, "session limit enforcement failed");
                Vec::new()
            }
        };
        if !pruned.is_empty() {
            let to = activity::recipients(&[user.id], Actor::system(), None);
            activity::notify(
                self.activity.as_ref(),
                Actor::system(),
                &to,
                &activity::sessions_pruned_message(pruned.len()),
            )
            .await;
        }
        self.cleanup(user.id).await;
    }

    async fn cleanup(&self, user_id: Uuid) {
        if let Err(e) = self.ledger.cleanup(user_id).await {
            warn!(error = %e, %user_id, "refresh token cleanup failed");
        }
    }
}
