use std::collections::HashSet;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CommentRepository, ProjectRepository, UserRepository};
use crate::domain::{
    Comment, NewComment, NewProject, NewUser, Project, ProjectFilter, ProjectListing, Role, User,
    UserStats,
};
use crate::error::AppError;

/// In-process store mirroring the Postgres schema, including its unique
/// email constraint and cascade rules. Rows are kept in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    projects: Vec<Project>,
    comments: Vec<Comment>,
}

fn duplicate_email() -> AppError {
    AppError::conflict("A user with this email already exists")
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(duplicate_email());
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            is_approved: user.is_approved,
            created_at: now,
            updated_at: now,
        };
        t.users.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let t = self.tables.read().await;
        Ok(t.users.iter().rev().cloned().collect())
    }

    async fn list_staff(&self, pending_only: bool) -> Result<Vec<User>, AppError> {
        let t = self.tables.read().await;
        let mut staff: Vec<User> = t
            .users
            .iter()
            .filter(|u| u.role == Role::Staff && (!pending_only || !u.is_approved))
            .cloned()
            .collect();
        staff.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(staff)
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let mut t = self.tables.write().await;
        if t
            .users
            .iter()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(duplicate_email());
        }
        let slot = t
            .users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| AppError::not_found("User does not exist"))?;
        *slot = User {
            updated_at: OffsetDateTime::now_utc(),
            ..user.clone()
        };
        Ok(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        let before = t.users.len();
        t.users.retain(|u| u.id != id);
        if t.users.len() == before {
            return Ok(false);
        }
        let gone = Some(id);
        for p in t.projects.iter_mut() {
            if p.staff_id == gone {
                p.staff_id = None;
            }
            if p.created_by_id == gone {
                p.created_by_id = None;
            }
            if p.last_edited_by_id == gone {
                p.last_edited_by_id = None;
            }
        }
        for c in t.comments.iter_mut().filter(|c| c.user_id == gone) {
            c.user_id = None;
        }
        Ok(true)
    }

    async fn stats(&self, id: Uuid) -> Result<UserStats, AppError> {
        let t = self.tables.read().await;
        Ok(UserStats {
            project_count: t.projects.iter().filter(|p| p.staff_id == Some(id)).count() as i64,
            comment_count: t.comments.iter().filter(|c| c.user_id == Some(id)).count() as i64,
        })
    }
}

#[async_trait]
impl ProjectRepository for MemoryStore {
    async fn create(&self, project: NewProject) -> Result<Project, AppError> {
        let mut t = self.tables.write().await;
        let now = OffsetDateTime::now_utc();
        let created = Project {
            id: Uuid::new_v4(),
            details: project.details,
            staff_id: Some(project.staff_id),
            created_by_id: Some(project.created_by_id),
            last_edited_by_id: Some(project.created_by_id),
            created_at: now,
            updated_at: now,
        };
        t.projects.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, AppError> {
        let t = self.tables.read().await;
        Ok(t.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, filter: &ProjectFilter) -> Result<Vec<ProjectListing>, AppError> {
        let t = self.tables.read().await;
        Ok(t.projects
            .iter()
            .rev()
            .filter(|p| filter.matches(p))
            .map(|p| ProjectListing {
                project: p.clone(),
                comment_count: t.comments.iter().filter(|c| c.project_id == p.id).count() as i64,
            })
            .collect())
    }

    async fn update(&self, project: &Project) -> Result<Project, AppError> {
        let mut t = self.tables.write().await;
        let slot = t
            .projects
            .iter_mut()
            .find(|p| p.id == project.id)
            .ok_or_else(|| AppError::not_found("Project does not exist"))?;
        *slot = Project {
            updated_at: OffsetDateTime::now_utc(),
            ..project.clone()
        };
        Ok(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        let before = t.projects.len();
        t.projects.retain(|p| p.id != id);
        if t.projects.len() == before {
            return Ok(false);
        }
        t.comments.retain(|c| c.project_id != id);
        Ok(true)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create(&self, comment: NewComment) -> Result<Comment, AppError> {
        let mut t = self.tables.write().await;
        let now = OffsetDateTime::now_utc();
        let created = Comment {
            id: Uuid::new_v4(),
            project_id: comment.project_id,
            user_id: comment.user_id,
            user_name: comment.user_name,
            content: comment.content,
            parent_id: comment.parent_id,
            created_at: now,
            updated_at: now,
        };
        t.comments.push(created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Comment>, AppError> {
        let t = self.tables.read().await;
        Ok(t.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn list_by_project(&self, project_id: Uuid) -> Result<Vec<Comment>, AppError> {
        let t = self.tables.read().await;
        Ok(t.comments
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Comment>, AppError> {
        let t = self.tables.read().await;
        Ok(t.comments
            .iter()
            .rev()
            .filter(|c| c.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn update_content(&self, id: Uuid, content: &str) -> Result<Comment, AppError> {
        let mut t = self.tables.write().await;
        let slot = t
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::not_found("Comment does not exist"))?;
        slot.content = content.to_string();
        slot.updated_at = OffsetDateTime::now_utc();
        Ok(slot.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        if !t.comments.iter().any(|c| c.id == id) {
            return Ok(false);
        }
        // parent_id cascades, so collect the whole subtree first
        let mut doomed: HashSet<Uuid> = HashSet::from([id]);
        loop {
            let grew: Vec<Uuid> = t
                .comments
                .iter()
                .filter(|c| !doomed.contains(&c.id))
                .filter(|c| c.parent_id.map(|p| doomed.contains(&p)).unwrap_or(false))
                .map(|c| c.id)
                .collect();
            if grew.is_empty() {
                break;
            }
            doomed.extend(grew);
        }
        t.comments.retain(|c| !doomed.contains(&c.id));
        Ok(true)
    }
}
