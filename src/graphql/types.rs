use async_graphql::{InputObject, SimpleObject};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::service::{IssuedSession, RegisterInput};
use crate::store::{RefreshToken, Role, User};

/// Public part of the user returned to the client.
#[derive(Debug, SimpleObject)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            role: u.role,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct AuthPayload {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

impl From<IssuedSession> for AuthPayload {
    fn from(s: IssuedSession) -> Self {
        Self {
            access_token: s.access_token,
            refresh_token: s.refresh_token,
            user: s.user.into(),
        }
    }
}

#[derive(Debug, SimpleObject)]
pub struct SessionInfo {
    pub id: Uuid,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl From<RefreshToken> for SessionInfo {
    fn from(t: RefreshToken) -> Self {
        Self {
            id: t.id,
            created_at: t.created_at,
            expires_at: t.expires_at,
        }
    }
}

#[derive(Debug, InputObject)]
pub struct RegisterUserInput {
    pub email: String,
    #[graphql(secret)]
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<RegisterUserInput> for RegisterInput {
    fn from(i: RegisterUserInput) -> Self {
        Self {
            email: i.email,
            password: i.password,
            first_name: i.first_name,
            last_name: i.last_name,
        }
    }
}
