use async_graphql::{http::GraphiQLSource, EmptySubscription, Schema};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};

mod mutation;
mod query;
pub mod types;

pub use mutation::MutationRoot;
pub use query::QueryRoot;

use crate::auth::{context::AuthContext, cookie::read_refresh_cookie};
use crate::state::AppState;

/// Where the GraphQL endpoint and GraphiQL are mounted.
pub const GRAPHQL_PATH: &str = "/graphql";

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Per-request data every resolver can read.
pub struct RequestContext {
    pub auth: AuthContext,
    pub refresh_cookie: Option<String>,
}

pub fn build_schema(state: AppState) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(state)
        .finish()
}

pub fn router(schema: AppSchema) -> Router<AppState> {
    Router::new()
        .route(GRAPHQL_PATH, get(graphiql).post(graphql_handler))
        .layer(Extension(schema))
}

async fn graphiql() -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint(GRAPHQL_PATH).finish())
}

async fn graphql_handler(
    State(state): State<AppState>,
    Extension(schema): Extension<AppSchema>,
    headers: HeaderMap,
    Json(request): Json<async_graphql::Request>,
) -> Response {
    let auth = AuthContext::resolve(&headers, state.auth.keys(), state.auth.users()).await;
    let refresh_cookie = read_refresh_cookie(&headers);
    tracing::debug!(
        authenticated = auth.is_authenticated,
        has_refresh_cookie = refresh_cookie.is_some(),
        "graphql request"
    );

    let response = schema
        .execute(request.data(RequestContext {
            auth,
            refresh_cookie,
        }))
        .await;

    let mut res = Json(&response).into_response();
    for (name, value) in response.http_headers.iter() {
        res.headers_mut().append(name, value.clone());
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use async_graphql::{Request, Value};
    use axum::http::header::{AUTHORIZATION, COOKIE};
    use std::sync::Arc;

    const REGISTER: &str = r#"mutation {
        register(input: {email: "ada@example.com", password: "correct-horse", firstName: "Ada", lastName: "Lovelace"}) {
            accessToken refreshToken user { id email firstName role }
        }
    }"#;

    const LOGIN: &str = r#"mutation {
        login(email: "ada@example.com", password: "correct-horse") { accessToken refreshToken }
    }"#;

    fn setup(max_sessions: u32) -> (AppState, AppSchema, Arc<MemoryStore>) {
        let (state, store) = AppState::fake(max_sessions);
        let schema = build_schema(state.clone());
        (state, schema, store)
    }

    async fn ctx(state: &AppState, access: Option<&str>, cookie: Option<&str>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(token) = access {
            headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().unwrap());
        }
        if let Some(c) = cookie {
            headers.insert(COOKIE, format!("jid={c}").parse().unwrap());
        }
        RequestContext {
            auth: AuthContext::resolve(&headers, state.auth.keys(), state.auth.users()).await,
            refresh_cookie: read_refresh_cookie(&headers),
        }
    }

    async fn run(schema: &AppSchema, query: &str, rc: RequestContext) -> async_graphql::Response {
        schema.execute(Request::new(query).data(rc)).await
    }

    fn field(resp: &async_graphql::Response, path: &[&str]) -> serde_json::Value {
        let mut v = resp.data.clone().into_json().unwrap();
        for p in path {
            v = v[*p].clone();
        }
        v
    }

    fn set_cookie(resp: &async_graphql::Response) -> String {
        resp.http_headers
            .get("set-cookie")
            .expect("set-cookie header")
            .to_str()
            .unwrap()
            .to_string()
    }

    fn error_code(resp: &async_graphql::Response) -> Value {
        resp.errors[0]
            .extensions
            .as_ref()
            .and_then(|e| e.get("code"))
            .cloned()
            .expect("code extension")
    }

    #[tokio::test]
    async fn register_login_and_current_user() {
        let (state, schema, _) = setup(5);

        let reg = run(&schema, REGISTER, ctx(&state, None, None).await).await;
        assert!(reg.errors.is_empty(), "{:?}", reg.errors);
        assert!(set_cookie(&reg).starts_with("jid="));
        assert_eq!(field(&reg, &["register", "user", "role"]), "MEMBER");

        let login = run(&schema, LOGIN, ctx(&state, None, None).await).await;
        assert!(login.errors.is_empty(), "{:?}", login.errors);
        let access = field(&login, &["login", "accessToken"]);
        let access = access.as_str().unwrap();
        assert!(!access.is_empty());
        assert!(set_cookie(&login).contains("HttpOnly"));

        let me = run(
            &schema,
            "{ currentUser { email firstName lastName } }",
            ctx(&state, Some(access), None).await,
        )
        .await;
        assert!(me.errors.is_empty(), "{:?}", me.errors);
        assert_eq!(field(&me, &["currentUser", "email"]), "ada@example.com");
        assert_eq!(field(&me, &["currentUser", "lastName"]), "Lovelace");
    }

    #[test]
    fn schema_never_exposes_password_fields() {
        let (_, schema, _) = setup(5);
        let sdl = schema.sdl();
        assert!(!sdl.contains("passwordHash"));
        assert!(!sdl.contains("isDeleted"));
        assert!(sdl.contains("currentUser"));
    }

    #[tokio::test]
    async fn current_user_requires_authentication() {
        let (state, schema, _) = setup(5);
        let resp = run(&schema, "{ currentUser { id } }", ctx(&state, None, None).await).await;
        assert_eq!(resp.errors[0].message, "authentication required");
        assert_eq!(error_code(&resp), Value::from("UNAUTHENTICATED"));

        let resp = run(
            &schema,
            "{ currentUser { id } }",
            ctx(&state, Some("not.a.jwt"), None).await,
        )
        .await;
        assert_eq!(error_code(&resp), Value::from("UNAUTHENTICATED"));
    }

    #[tokio::test]
    async fn bad_credentials_share_a_message() {
        let (state, schema, _) = setup(5);
        run(&schema, REGISTER, ctx(&state, None, None).await).await;

        let wrong = run(
            &schema,
            r#"mutation { login(email: "ada@example.com", password: "nope-nope") { accessToken } }"#,
            ctx(&state, None, None).await,
        )
        .await;
        let unknown = run(
            &schema,
            r#"mutation { login(email: "bob@example.com", password: "correct-horse") { accessToken } }"#,
            ctx(&state, None, None).await,
        )
        .await;
        assert_eq!(wrong.errors[0].message, unknown.errors[0].message);
        assert_eq!(error_code(&wrong), Value::from("UNAUTHENTICATED"));
        assert!(wrong.http_headers.get("set-cookie").is_none());
    }

    #[tokio::test]
    async fn validation_errors_carry_bad_user_input() {
        let (state, schema, _) = setup(5);
        let resp = run(
            &schema,
            r#"mutation { register(input: {email: "bad", password: "correct-horse", firstName: "A", lastName: "B"}) { accessToken } }"#,
            ctx(&state, None, None).await,
        )
        .await;
        assert_eq!(error_code(&resp), Value::from("BAD_USER_INPUT"));
    }

    #[tokio::test]
    async fn refresh_reads_cookie_and_rotates() {
        let (state, schema, _) = setup(5);
        let reg = run(&schema, REGISTER, ctx(&state, None, None).await).await;
        let old = field(&reg, &["register", "refreshToken"]);
        let old = old.as_str().unwrap();

        let q = "mutation { refreshToken { accessToken refreshToken } }";
        let refreshed = run(&schema, q, ctx(&state, None, Some(old)).await).await;
        assert!(refreshed.errors.is_empty(), "{:?}", refreshed.errors);
        let new = field(&refreshed, &["refreshToken", "refreshToken"]);
        let new = new.as_str().unwrap();
        assert_ne!(new, old);
        assert!(set_cookie(&refreshed).starts_with(&format!("jid={new}")));

        let replay = run(&schema, q, ctx(&state, None, Some(old)).await).await;
        assert_eq!(error_code(&replay), Value::from("UNAUTHENTICATED"));
        assert!(set_cookie(&replay).contains("Max-Age=0"));

        let missing = run(&schema, q, ctx(&state, None, None).await).await;
        assert_eq!(missing.errors[0].message, "refresh token missing");
    }

    #[tokio::test]
    async fn logout_twice_clears_cookie_both_times() {
        let (state, schema, store) = setup(5);
        let reg = run(&schema, REGISTER, ctx(&state, None, None).await).await;
        let token = field(&reg, &["register", "refreshToken"]);
        let token = token.as_str().unwrap();

        for _ in 0..2 {
            let out = run(&schema, "mutation { logout }", ctx(&state, None, Some(token)).await).await;
            assert!(out.errors.is_empty(), "{:?}", out.errors);
            assert_eq!(field(&out, &["logout"]), true);
            assert!(set_cookie(&out).contains("Max-Age=0"));
        }
        assert!(store.tokens.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sessions_and_logout_all() {
        let (state, schema, _) = setup(5);
        run(&schema, REGISTER, ctx(&state, None, None).await).await;
        let login = run(&schema, LOGIN, ctx(&state, None, None).await).await;
        let access = field(&login, &["login", "accessToken"]);
        let access = access.as_str().unwrap();

        let sessions = run(
            &schema,
            "{ sessions { id createdAt expiresAt } }",
            ctx(&state, Some(access), None).await,
        )
        .await;
        assert_eq!(field(&sessions, &["sessions"]).as_array().unwrap().len(), 2);

        let out = run(&schema, "mutation { logoutAll }", ctx(&state, Some(access), None).await).await;
        assert_eq!(field(&out, &["logoutAll"]), 2);

        let anon = run(&schema, "mutation { logoutAll }", ctx(&state, None, None).await).await;
        assert_eq!(error_code(&anon), Value::from("UNAUTHENTICATED"));
    }
}
