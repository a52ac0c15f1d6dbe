use serde::Serialize;
use uuid::Uuid;

use super::{comment::Comment, project::Project, user::Role, user::User};
use crate::error::AppError;

/// Per-route role allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    AdminOnly,
    StaffOrAdmin,
    AnyRole,
}

impl Access {
    pub fn permits(self, role: Role) -> bool {
        match self {
            Access::AdminOnly => role == Role::Admin,
            Access::StaffOrAdmin => matches!(role, Role::Staff | Role::Admin),
            Access::AnyRole => true,
        }
    }
}

/// The authenticated caller, re-loaded from storage on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_approved: bool,
}

impl From<&User> for CurrentUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            is_approved: u.is_approved,
        }
    }
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require(&self, access: Access) -> Result<(), AppError> {
        if access.permits(self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden("Insufficient permissions"))
        }
    }

    /// Staff-or-admin, and staff must have been approved.
    pub fn require_project_author(&self) -> Result<(), AppError> {
        self.require(Access::StaffOrAdmin)?;
        if self.role == Role::Staff && !self.is_approved {
            return Err(AppError::forbidden(
                "Your staff account is awaiting admin approval",
            ));
        }
        Ok(())
    }

    pub fn owns(&self, project: &Project) -> bool {
        self.role == Role::Staff && project.staff_id == Some(self.id)
    }

    pub fn can_manage_project(&self, project: &Project) -> bool {
        self.is_admin() || self.owns(project)
    }

    pub fn can_moderate_comment(&self, comment: &Comment, project: &Project) -> bool {
        self.is_admin() || comment.user_id == Some(self.id) || self.owns(project)
    }

    /// Admins may look at anyone; everyone else only at themselves.
    pub fn can_view_account(&self, user_id: Uuid) -> bool {
        self.is_admin() || self.id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::{ProjectInput, ProjectStatus};
    use time::OffsetDateTime;

    fn caller(role: Role, is_approved: bool) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            name: "Caller".into(),
            email: "caller@county.go.ke".into(),
            role,
            is_approved,
        }
    }

    fn project_owned_by(staff_id: Option<Uuid>) -> Project {
        let now = OffsetDateTime::now_utc();
        Project {
            id: Uuid::new_v4(),
            details: ProjectInput {
                title: Some("Market shed".into()),
                status: Some(ProjectStatus::Ongoing),
                ..ProjectInput::default()
            }
            .into_details()
            .unwrap(),
            staff_id,
            created_by_id: staff_id,
            last_edited_by_id: staff_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn comment_by(user_id: Option<Uuid>, project: &Project) -> Comment {
        let now = OffsetDateTime::now_utc();
        Comment {
            id: Uuid::new_v4(),
            project_id: project.id,
            user_id,
            user_name: "Someone".into(),
            content: "Nice".into(),
            parent_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn allow_lists() {
        assert!(Access::AdminOnly.permits(Role::Admin));
        assert!(!Access::AdminOnly.permits(Role::Staff));
        assert!(Access::StaffOrAdmin.permits(Role::Staff));
        assert!(!Access::StaffOrAdmin.permits(Role::Public));
        assert!(Access::AnyRole.permits(Role::Public));
    }

    #[test]
    fn require_maps_to_forbidden() {
        let err = caller(Role::Public, true).require(Access::AdminOnly).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn unapproved_staff_cannot_author_projects() {
        assert!(caller(Role::Staff, false).require_project_author().is_err());
        assert!(caller(Role::Staff, true).require_project_author().is_ok());
        assert!(caller(Role::Admin, false).require_project_author().is_ok());
        assert!(caller(Role::Public, true).require_project_author().is_err());
    }

    #[test]
    fn ownership_rules() {
        let staff = caller(Role::Staff, true);
        let other = caller(Role::Staff, true);
        let admin = caller(Role::Admin, true);
        let project = project_owned_by(Some(staff.id));

        assert!(staff.can_manage_project(&project));
        assert!(!other.can_manage_project(&project));
        assert!(admin.can_manage_project(&project));
    }

    #[test]
    fn comment_moderation_rules() {
        let owner = caller(Role::Staff, true);
        let author = caller(Role::Public, true);
        let stranger = caller(Role::Public, true);
        let project = project_owned_by(Some(owner.id));
        let comment = comment_by(Some(author.id), &project);
        let anonymous = comment_by(None, &project);

        assert!(author.can_moderate_comment(&comment, &project));
        assert!(owner.can_moderate_comment(&comment, &project));
        assert!(!stranger.can_moderate_comment(&comment, &project));
        assert!(!stranger.can_moderate_comment(&anonymous, &project));
        assert!(caller(Role::Admin, true).can_moderate_comment(&anonymous, &project));
    }
}
