use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

/// Optional bootstrap administrator created at start-up.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` runs the service on the in-process memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
    /// Key client addresses on `X-Forwarded-For` instead of the peer address.
    pub trust_proxy_headers: bool,
    pub jwt: JwtConfig,
    pub comment_rate_limit: RateLimitConfig,
    pub admin_seed: Option<AdminSeed>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str, default: i64| -> anyhow::Result<i64> {
            match var(key) {
                Some(v) => v
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("{key} must be an integer")),
                None => Ok(default),
            }
        };

        let jwt = JwtConfig {
            secret: var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "county-tracker".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "county-tracker-clients".into()),
            ttl_minutes: parsed("JWT_TTL_MINUTES", 60 * 24 * 7)?,
            refresh_ttl_minutes: parsed("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 30)?,
        };
        anyhow::ensure!(!jwt.secret.is_empty(), "JWT_SECRET must not be empty");

        let comment_rate_limit = RateLimitConfig {
            max_requests: parsed("COMMENT_RATE_LIMIT_MAX", 5)?.max(1) as usize,
            window_secs: parsed("COMMENT_RATE_LIMIT_WINDOW_SECS", 600)?.max(1) as u64,
        };

        let trust_proxy_headers = match var("TRUST_PROXY_HEADERS").as_deref().map(str::trim) {
            None | Some("") => false,
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => true,
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => false,
            Some(v) => anyhow::bail!("TRUST_PROXY_HEADERS must be true or false, got {v:?}"),
        };

        let admin_seed = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                name: var("ADMIN_NAME").unwrap_or_else(|| "System Admin".into()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: var("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 10)?.max(1) as u32,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: var("APP_PORT")
                .unwrap_or_else(|| "3000".into())
                .parse()
                .context("APP_PORT must be a port number")?,
            cors_origin: var("CORS_ORIGIN").filter(|v| !v.trim().is_empty()),
            trust_proxy_headers,
            jwt,
            comment_rate_limit,
            admin_seed,
        })
    }

    /// Fixed settings for tests and local experiments.
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            db_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 0,
            cors_origin: None,
            trust_proxy_headers: false,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            comment_rate_limit: RateLimitConfig {
                max_requests: 5,
                window_secs: 600,
            },
            admin_seed: None,
        }
    }
}
