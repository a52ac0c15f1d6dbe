use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

use crate::{
    auth::JwtKeys,
    config::AppConfig,
    domain::User,
    rate_limit::RateLimiter,
    repo::{CommentRepository, ProjectRepository, Repositories, UserRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub jwt: JwtKeys,
    pub comment_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Connects to Postgres and applies migrations when `DATABASE_URL` is set,
    /// otherwise falls back to the in-process store.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let repos = match config.database_url.as_deref() {
            Some(url) => {
                let db = PgPoolOptions::new()
                    .max_connections(config.db_max_connections)
                    .connect(url)
                    .await
                    .context("failed to connect to DATABASE_URL")?;
                sqlx::migrate!("./migrations")
                    .run(&db)
                    .await
                    .context("failed to apply migrations")?;
                info!("connected to postgres");
                Repositories::postgres(db)
            }
            None => {
                warn!("DATABASE_URL not set; using the in-memory store, data will not survive a restart");
                Repositories::memory()
            }
        };
        Ok(Self::from_parts(Arc::new(config), repos))
    }

    pub fn from_parts(config: Arc<AppConfig>, repos: Repositories) -> Self {
        Self {
            jwt: JwtKeys::from_config(&config.jwt),
            comment_limiter: Arc::new(RateLimiter::from_config(&config.comment_rate_limit)),
            users: repos.users,
            projects: repos.projects,
            comments: repos.comments,
            config,
        }
    }

    /// Memory-backed state, used by tests.
    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_parts(Arc::new(config), Repositories::memory())
    }

    pub fn fake() -> Self {
        Self::in_memory(AppConfig::for_tests())
    }

    /// Creates the configured bootstrap administrator if the email is free.
    pub async fn seed_admin(&self) -> anyhow::Result<Option<User>> {
        let Some(seed) = self.config.admin_seed.clone() else {
            return Ok(None);
        };
        Ok(crate::users::services::ensure_admin(self, &seed).await?)
    }
}
