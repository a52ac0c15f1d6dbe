//! Storage ports. Handlers only ever talk to these traits; `postgres` is the
//! production backend and `memory` backs local runs and the test suite.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Comment, NewComment, NewProject, NewUser, Project, ProjectFilter, ProjectListing, User,
    UserStats,
};
use crate::error::AppError;

pub mod memory;
pub mod postgres;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<User>, AppError>;
    /// Staff accounts ordered by name, optionally only those awaiting approval.
    async fn list_staff(&self, pending_only: bool) -> Result<Vec<User>, AppError>;
    async fn update(&self, user: &User) -> Result<User, AppError>;
    /// Returns `false` when no row matched.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
    async fn stats(&self, id: Uuid) -> Result<UserStats, AppError>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: NewProject) -> Result<Project, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, AppError>;
    /// Newest first.
    async fn list(&self, filter: &ProjectFilter) -> Result<Vec<ProjectListing>, AppError>;
    async fn update(&self, project: &Project) -> Result<Project, AppError>;
    /// Removes the project and its comments.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: NewComment) -> Result<Comment, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, AppError>;
    /// Oldest first.
    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Comment>, AppError>;
    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Comment>, AppError>;
    async fn update_content(&self, id: Uuid, content: &str) -> Result<Comment, AppError>;
    /// Removes the comment and its replies.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub comments: Arc<dyn CommentRepository>,
}

impl Repositories {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            users: Arc::new(postgres::PgUserRepo::new(pool.clone())),
            projects: Arc::new(postgres::PgProjectRepo::new(pool.clone())),
            comments: Arc::new(postgres::PgCommentRepo::new(pool)),
        }
    }

    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            users: store.clone(),
            projects: store.clone(),
            comments: store,
        }
    }
}
