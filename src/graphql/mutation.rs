use async_graphql::{Context, ErrorExtensions, Object, Result as GraphQLResult};

use super::{
    types::{AuthPayload, RegisterUserInput},
    RequestContext,
};
use crate::auth::cookie::{clear_refresh_cookie, refresh_cookie};
use crate::state::AppState;

pub struct MutationRoot;

fn set_refresh_cookie(ctx: &Context<'_>, state: &AppState, value: &str) {
    let cookie = refresh_cookie(value, state.auth.ledger().ttl(), state.config.production);
    ctx.insert_http_header("Set-Cookie", cookie.to_string());
}

fn unset_refresh_cookie(ctx: &Context<'_>, state: &AppState) {
    let cookie = clear_refresh_cookie(state.config.production);
    ctx.insert_http_header("Set-Cookie", cookie.to_string());
}

#[Object]
impl MutationRoot {
    async fn register(
        &self,
        ctx: &Context<'_>,
        input: RegisterUserInput,
    ) -> GraphQLResult<AuthPayload> {
        let state = ctx.data::<AppState>()?;
        let session = state
            .auth
            .register(input.into())
            .await
            .map_err(|e| e.extend())?;
        set_refresh_cookie(ctx, state, &session.refresh_token);
        Ok(session.into())
    }

    async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        #[graphql(secret)] password: String,
    ) -> GraphQLResult<AuthPayload> {
        let state = ctx.data::<AppState>()?;
        let session = state
            .auth
            .login(&email, &password)
            .await
            .map_err(|e| e.extend())?;
        set_refresh_cookie(ctx, state, &session.refresh_token);
        Ok(session.into())
    }

    /// Reads the `jid` cookie, rotates it and returns a fresh pair.
    async fn refresh_token(&self, ctx: &Context<'_>) -> GraphQLResult<AuthPayload> {
        let state = ctx.data::<AppState>()?;
        let req = ctx.data::<RequestContext>()?;
        match state.auth.refresh(req.refresh_cookie.as_deref()).await {
            Ok(session) => {
                set_refresh_cookie(ctx, state, &session.refresh_token);
                Ok(session.into())
            }
            Err(e) => {
                unset_refresh_cookie(ctx, state);
                Err(e.extend())
            }
        }
    }

    async fn logout(&self, ctx: &Context<'_>) -> GraphQLResult<bool> {
        let state = ctx.data::<AppState>()?;
        let req = ctx.data::<RequestContext>()?;
        unset_refresh_cookie(ctx, state);
        state
            .auth
            .logout(req.refresh_cookie.as_deref())
            .await
            .map_err(|e| e.extend())?;
        Ok(true)
    }

    /// Revokes every session of the current user. Returns how many were live.
    async fn logout_all(&self, ctx: &Context<'_>) -> GraphQLResult<u64> {
        let state = ctx.data::<AppState>()?;
        let req = ctx.data::<RequestContext>()?;
        let user = req.auth.require_user().map_err(|e| e.extend())?;
        let revoked = state.auth.logout_all(user).await.map_err(|e| e.extend())?;
        unset_refresh_cookie(ctx, state);
        Ok(revoked)
    }
}
