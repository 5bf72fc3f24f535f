use async_graphql::{Context, ErrorExtensions, Object, Result as GraphQLResult};

use super::{
    types::{PublicUser, SessionInfo},
    RequestContext,
};
use crate::state::AppState;

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn current_user(&self, ctx: &Context<'_>) -> GraphQLResult<PublicUser> {
        let req = ctx.data::<RequestContext>()?;
        let user = req.auth.require_user().map_err(|e| e.extend())?;
        Ok(user.clone().into())
    }

    /// Live refresh sessions of the current user, oldest first.
    async fn sessions(&self, ctx: &Context<'_>) -> GraphQLResult<Vec<SessionInfo>> {
        let state = ctx.data::<AppState>()?;
        let req = ctx.data::<RequestContext>()?;
        let user = req.auth.require_user().map_err(|e| e.extend())?;
        let rows = state.auth.sessions(user).await.map_err(|e| e.extend())?;
        Ok(rows.into_iter().map(SessionInfo::from).collect())
    }
}
