use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Limits and costs of the refresh-token ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// `0` means unlimited.
    pub max_per_user: u32,
    /// Argon2 time cost used for password and refresh-token hashes.
    pub hash_cost: u32,
    pub refresh_token_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub production: bool,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "taskforge".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "taskforge-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 15),
            refresh_ttl_minutes: parse_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7),
        };

        let session = SessionConfig {
            max_per_user: parse_or("MAX_SESSIONS_PER_USER", 5),
            hash_cost: parse_or("HASH_COST", 2).max(1),
            refresh_token_bytes: parse_or("REFRESH_TOKEN_BYTES", 40).max(16),
        };

        let production = std::env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            jwt,
            session,
            production,
        })
    }
}
