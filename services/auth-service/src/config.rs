use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::tokens::TokenConfig;

pub const DEFAULT_PUBLIC_ROUTES: &[&str] = &[
    "/v1/auth/signup",
    "/v1/auth/login",
    "/v1/auth/refresh",
    "/healthz",
];

pub const DEFAULT_USER_ROUTES: &[&str] = &["/v1/auth/logout", "/v1/users/me", "/v1/users/update"];

#[derive(Clone)]
pub struct AuthConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub tokens: TokenConfig,
    pub public_routes: Vec<String>,
    pub user_routes: Vec<String>,
    pub store_timeout: Duration,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tokens", &self.tokens)
            .field("public_routes", &self.public_routes)
            .field("user_routes", &self.user_routes)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.access_secret.trim().is_empty() {
            bail!("JWT_ACCESS_SECRET must not be empty");
        }
        if self.refresh_secret.trim().is_empty() {
            bail!("JWT_REFRESH_SECRET must not be empty");
        }
        if self.access_secret == self.refresh_secret {
            bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must differ");
        }
        if self.tokens.access_ttl_seconds <= 0 || self.tokens.refresh_ttl_seconds <= 0 {
            bail!("token lifetimes must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
}

pub fn load_auth_config() -> Result<AuthConfig> {
    let access_secret = env::var("JWT_ACCESS_SECRET").context("JWT_ACCESS_SECRET must be set")?;
    let refresh_secret =
        env::var("JWT_REFRESH_SECRET").context("JWT_REFRESH_SECRET must be set")?;

    let access_ttl_seconds = i64_from_env("JWT_ACCESS_EXPIRE_SECONDS")?.unwrap_or(900);
    let refresh_ttl_seconds = i64_from_env("JWT_REFRESH_EXPIRE_SECONDS")?.unwrap_or(604_800);
    let issuer = env::var("JWT_ISSUER")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "auth-service".to_string());
    let audience = env::var("JWT_AUDIENCE")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "auth-service".to_string());

    let public_routes = env::var("AUTH_PUBLIC_ROUTES")
        .ok()
        .map(|value| parse_routes(&value))
        .unwrap_or_else(|| to_owned_list(DEFAULT_PUBLIC_ROUTES));
    let user_routes = env::var("AUTH_USER_ROUTES")
        .ok()
        .map(|value| parse_routes(&value))
        .unwrap_or_else(|| to_owned_list(DEFAULT_USER_ROUTES));

    let store_timeout_ms = i64_from_env("AUTH_STORE_TIMEOUT_MS")?.unwrap_or(2000).max(1);

    let config = AuthConfig {
        access_secret,
        refresh_secret,
        tokens: TokenConfig {
            issuer,
            audience,
            access_ttl_seconds,
            refresh_ttl_seconds,
        },
        public_routes,
        user_routes,
        store_timeout: Duration::from_millis(store_timeout_ms.unsigned_abs()),
    };
    config.validate()?;
    Ok(config)
}

pub fn load_server_config() -> Result<ServerConfig> {
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let redis_url = env::var("REDIS_URL").context("REDIS_URL must be set")?;
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8085);
    let ip: IpAddr = host
        .parse()
        .map_err(|err| anyhow!("Invalid HOST '{host}': {err}"))?;
    Ok(ServerConfig {
        addr: SocketAddr::from((ip, port)),
        database_url,
        redis_url,
    })
}

fn i64_from_env(key: &str) -> Result<Option<i64>> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|err| anyhow!("Invalid {key} '{value}': {err}")),
        Err(_) => Ok(None),
    }
}

fn parse_routes(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(|item| normalize_optional(item))
        .collect()
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
